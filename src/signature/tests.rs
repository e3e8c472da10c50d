use super::*;

#[test]
fn test_parse_signature() {
    let sig: Signature = "aa:bb:cc:dd:ee:ff/2".parse().unwrap();
    assert_eq!(sig.identifier(), "aa:bb:cc:dd:ee:ff");
    assert_eq!(sig.id_type(), "2");
    assert_eq!(sig.to_string(), "aa:bb:cc:dd:ee:ff/2");
}

#[test]
fn test_parse_signature_empty() {
    let result = "".parse::<Signature>();
    assert!(matches!(result, Err(ParseError::Empty)));
}

#[test]
fn test_parse_signature_without_type() {
    let result = "aabbccddeeff".parse::<Signature>();
    assert!(matches!(result, Err(ParseError::MissingType(_))));
}

#[test]
fn test_parse_signature_empty_parts() {
    assert!(matches!(
        "/2".parse::<Signature>(),
        Err(ParseError::InvalidFormat(_))
    ));
    assert!(matches!(
        "aabb/".parse::<Signature>(),
        Err(ParseError::InvalidFormat(_))
    ));
}

#[test]
fn test_parse_signature_extra_separator() {
    let result = "a/b/c".parse::<Signature>();
    assert!(matches!(result, Err(ParseError::InvalidFormat(_))));
}

#[test]
fn test_new_rejects_separator_in_identifier() {
    assert!(Signature::new("a/b", "2").is_err());
    assert!(Signature::new("ab", "").is_err());
}

#[test]
fn test_route() {
    let sig = Signature::new("fee150bada55", "3").unwrap();
    assert_eq!(sig.route(), "/context/device/fee150bada55/3");
}

#[test]
fn test_serde_as_string() {
    let sig = Signature::new("aa:bb", "2").unwrap();
    let json = serde_json::to_string(&sig).unwrap();
    assert_eq!(json, "\"aa:bb/2\"");

    let back: Signature = serde_json::from_str(&json).unwrap();
    assert_eq!(back, sig);

    assert!(serde_json::from_str::<Signature>("\"nope\"").is_err());
}
