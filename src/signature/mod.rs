use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[cfg(test)]
mod tests;

/// Separator between identifier and identifier type
pub const SIGNATURE_SEPARATOR: char = '/';

/// Composite device key: `identifier/identifierType`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signature {
    identifier: String,
    id_type: String,
}

/// Signature parsing errors
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Empty signature string
    Empty,
    /// No `/` separating identifier and type
    MissingType(String),
    /// Identifier or type part is empty
    InvalidFormat(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Empty => write!(f, "signature is empty"),
            ParseError::MissingType(s) => {
                write!(f, "signature '{}' has no identifier type", s)
            }
            ParseError::InvalidFormat(s) => write!(f, "invalid signature '{}'", s),
        }
    }
}

impl std::error::Error for ParseError {}

impl Signature {
    /// Build a signature from its two parts.
    ///
    /// Rejects empty parts and identifiers containing the separator.
    pub fn new(identifier: &str, id_type: &str) -> Result<Self, ParseError> {
        if identifier.is_empty() || id_type.is_empty() {
            return Err(ParseError::InvalidFormat(format!(
                "{}{}{}",
                identifier, SIGNATURE_SEPARATOR, id_type
            )));
        }
        if identifier.contains(SIGNATURE_SEPARATOR) || id_type.contains(SIGNATURE_SEPARATOR) {
            return Err(ParseError::InvalidFormat(format!(
                "{}{}{}",
                identifier, SIGNATURE_SEPARATOR, id_type
            )));
        }

        Ok(Self {
            identifier: identifier.to_string(),
            id_type: id_type.to_string(),
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn id_type(&self) -> &str {
        &self.id_type
    }

    /// Channel route for subscribers interested in this device
    ///
    /// ```
    /// use perch::signature::Signature;
    ///
    /// let sig: Signature = "aa:bb/2".parse().unwrap();
    /// assert_eq!(sig.route(), "/context/device/aa:bb/2");
    /// ```
    pub fn route(&self) -> String {
        format!("/context/device/{}", self)
    }
}

impl FromStr for Signature {
    type Err = ParseError;

    /// Parse `identifier/type`; the last `/` separates the type.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseError::Empty);
        }

        let (identifier, id_type) = s
            .rsplit_once(SIGNATURE_SEPARATOR)
            .ok_or_else(|| ParseError::MissingType(s.to_string()))?;

        Signature::new(identifier, id_type).map_err(|_| ParseError::InvalidFormat(s.to_string()))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.identifier, SIGNATURE_SEPARATOR, self.id_type)
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
