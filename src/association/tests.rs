use super::*;
use crate::signature::Signature;
use crate::status::Status;
use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn manager() -> AssociationsManager {
    let store = SqliteAssociationStore::new(":memory:").unwrap();
    AssociationsManager::new(Arc::new(store))
}

fn sig(s: &str) -> Signature {
    s.parse().unwrap()
}

fn update(value: serde_json::Value) -> AssociationUpdate {
    serde_json::from_value(value).unwrap()
}

fn strings(items: &[&str]) -> Option<Vec<String>> {
    Some(items.iter().map(|s| s.to_string()).collect())
}

// ── directory prefix match ───────────────────────────────────────────────────

#[test]
fn test_directory_prefix_match_is_reflexive() {
    for dir in ["site", "site:zoneA", "floor1:room3:desk", ""] {
        assert!(directory_prefix_match(dir, dir), "{} should match itself", dir);
    }
}

#[test]
fn test_directory_prefix_match_segment_boundary() {
    assert!(directory_prefix_match("floor1", "floor1:room3"));
    assert!(!directory_prefix_match("floor1", "floor10"));
    assert!(!directory_prefix_match("floor1:room3", "floor1"));
    assert!(!directory_prefix_match("floor2", "floor1:room3"));
}

// ── filter_by_query / trim ───────────────────────────────────────────────────

fn sample_record() -> Association {
    Association {
        url: Some("https://example.com/a".to_string()),
        directory: Some("site:zoneA".to_string()),
        tags: strings(&["lobby", "visitor"]),
        position: Some(vec![1.0, 2.0]),
    }
}

#[test]
fn test_filter_without_params_is_presence_only() {
    let result = filter_by_query(&sample_record(), &QueryParams::default()).unwrap();
    assert!(result.is_empty());
}

#[test]
fn test_filter_include_only_projects() {
    let params = QueryParams {
        include: strings(&["url", "nonsense"]),
        ..Default::default()
    };
    let result = filter_by_query(&sample_record(), &params).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result["url"], json!("https://example.com/a"));
}

#[test]
fn test_filter_by_tag() {
    let params = QueryParams {
        tag: strings(&["nope", "visitor"]),
        ..Default::default()
    };
    let result = filter_by_query(&sample_record(), &params).unwrap();
    assert_eq!(result["tags"], json!(["lobby", "visitor"]));
    assert_eq!(result["directory"], json!("site:zoneA"));

    let params = QueryParams {
        tag: strings(&["staff"]),
        ..Default::default()
    };
    assert!(filter_by_query(&sample_record(), &params).is_none());
}

#[test]
fn test_filter_by_directory_with_include() {
    let params = QueryParams {
        directory: strings(&["site"]),
        include: strings(&["position"]),
        ..Default::default()
    };
    let result = filter_by_query(&sample_record(), &params).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result["position"], json!([1.0, 2.0]));

    let params = QueryParams {
        directory: strings(&["sit"]),
        ..Default::default()
    };
    assert!(filter_by_query(&sample_record(), &params).is_none());
}

#[test]
fn test_empty_record_never_matches_criteria() {
    let params = QueryParams {
        tag: strings(&["lobby"]),
        directory: strings(&["site"]),
        ..Default::default()
    };
    assert!(filter_by_query(&Association::default(), &params).is_none());
}

#[test]
fn test_trim_ignores_absent_fields() {
    let record = Association {
        url: Some("x".to_string()),
        ..Default::default()
    };
    let trimmed = trim(&record, &["url".to_string(), "tags".to_string()]);
    assert_eq!(trimmed.len(), 1);
    assert!(trimmed.contains_key("url"));
}

// ── lenient updates ──────────────────────────────────────────────────────────

#[test]
fn test_apply_ignores_invalid_types_per_field() {
    let mut record = Association::default();
    record.apply(&update(json!({
        "url": 42,
        "directory": "site:zoneA",
        "tags": "not-a-list",
        "position": [1, 2.5, 3]
    })));

    assert_eq!(record.url, None);
    assert_eq!(record.directory.as_deref(), Some("site:zoneA"));
    assert_eq!(record.tags, None);
    assert_eq!(record.position, Some(vec![1.0, 2.5, 3.0]));
}

#[test]
fn test_apply_ignores_wrong_sized_position() {
    let mut record = Association::default();
    record.apply(&update(json!({ "position": [1.0] })));
    assert_eq!(record.position, None);

    record.apply(&update(json!({ "position": [1, 2, 3, 4, 5] })));
    assert_eq!(record.position, None);

    record.apply(&update(json!({ "position": [4, 5] })));
    assert_eq!(record.position, Some(vec![4.0, 5.0]));

    record.apply(&update(json!({ "position": [] })));
    assert_eq!(record.position, Some(vec![4.0, 5.0]));
}

#[test]
fn test_apply_dedupes_tags() {
    let mut record = Association::default();
    record.apply(&update(json!({ "tags": ["b", "a", "b", "a"] })));
    assert_eq!(record.tags, strings(&["b", "a"]));
}

#[test]
fn test_apply_rejects_mixed_lists() {
    let mut record = Association::default();
    record.apply(&update(json!({ "tags": ["a", 1], "position": [1, "x"] })));
    assert!(record.is_empty());
}

#[test]
fn test_retain_only() {
    let kept = update(json!({ "url": "x", "tags": ["a"] })).retain_only(AssociationField::Tags);
    assert!(kept.url.is_none());
    assert_eq!(kept.tags, Some(json!(["a"])));
}

// ── manager ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_replace_creates_then_updates() {
    let manager = manager();

    let (record, status) = manager
        .replace(&sig("aa:bb/2"), &update(json!({ "url": "x" })))
        .await
        .unwrap();
    assert_eq!(status, Status::Created);
    assert_eq!(record.url.as_deref(), Some("x"));

    let (record, status) = manager
        .replace(&sig("aa:bb/2"), &update(json!({ "tags": ["a"] })))
        .await
        .unwrap();
    assert_eq!(status, Status::Ok);
    assert_eq!(record.url.as_deref(), Some("x"));
    assert_eq!(record.tags, strings(&["a"]));
}

#[tokio::test]
async fn test_retrieve_single_and_property() {
    let manager = manager();
    manager
        .replace(&sig("aa:bb/2"), &update(json!({ "url": "x", "directory": "d" })))
        .await
        .unwrap();

    let all = manager.retrieve(Some(&sig("aa:bb/2")), None, &QueryParams::default()).await.unwrap();
    assert_eq!(all["aa:bb/2"]["url"], json!("x"));
    assert_eq!(all["aa:bb/2"]["directory"], json!("d"));

    let params = QueryParams {
        include: strings(&["url", "tags"]),
        ..Default::default()
    };
    let projected = manager.retrieve(Some(&sig("aa:bb/2")), None, &params).await.unwrap();
    assert_eq!(projected["aa:bb/2"], *json!({ "url": "x" }).as_object().unwrap());

    let one = manager
        .retrieve(Some(&sig("aa:bb/2")), Some(AssociationField::Url), &QueryParams::default())
        .await
        .unwrap();
    assert_eq!(one["aa:bb/2"].len(), 1);

    let missing = manager
        .retrieve(Some(&sig("aa:bb/2")), Some(AssociationField::Tags), &QueryParams::default())
        .await;
    assert_eq!(missing, Err(AssociationError::NotFound));
}

#[tokio::test]
async fn test_retrieve_missing_record() {
    let manager = manager();
    let result = manager.retrieve(Some(&sig("no:pe/1")), None, &QueryParams::default()).await;
    assert_eq!(result, Err(AssociationError::NotFound));
    assert_eq!(result.unwrap_err().status(), Status::NotFound);
}

#[tokio::test]
async fn test_retrieve_bulk_by_tag() {
    let manager = manager();
    manager.replace(&sig("a/1"), &update(json!({ "tags": ["x"] }))).await.unwrap();
    manager.replace(&sig("b/1"), &update(json!({ "tags": ["y"] }))).await.unwrap();
    manager.replace(&sig("c/1"), &update(json!({ "url": "u" }))).await.unwrap();

    let params = QueryParams {
        tag: strings(&["x"]),
        ..Default::default()
    };
    let result = manager.retrieve(None, None, &params).await.unwrap();
    assert_eq!(result.len(), 1);
    assert!(result.contains_key("a/1"));

    let everything = manager.retrieve(None, None, &QueryParams::default()).await.unwrap();
    assert_eq!(everything.len(), 3);
    assert!(everything.values().all(|v| v.is_empty()));
}

#[tokio::test]
async fn test_remove_property() {
    let manager = manager();
    manager.replace(&sig("a/1"), &update(json!({ "url": "u" }))).await.unwrap();

    let result = manager.remove(&sig("a/1"), Some(AssociationField::Tags)).await;
    assert_eq!(result, Err(AssociationError::NotFound));

    manager.remove(&sig("a/1"), Some(AssociationField::Url)).await.unwrap();

    // Last field gone, record still there
    let record = manager.retrieve(Some(&sig("a/1")), None, &QueryParams::default()).await.unwrap();
    assert!(record["a/1"].is_empty());

    // Empty records are skipped by the bulk listing
    let listed = manager.retrieve(None, None, &QueryParams::default()).await.unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn test_remove_record() {
    let manager = manager();
    manager.replace(&sig("a/1"), &update(json!({ "url": "u" }))).await.unwrap();

    manager.remove(&sig("a/1"), None).await.unwrap();
    assert_eq!(manager.remove(&sig("a/1"), None).await, Err(AssociationError::NotFound));
    assert_eq!(
        manager.remove(&sig("a/1"), Some(AssociationField::Url)).await,
        Err(AssociationError::NotFound)
    );
}

struct ChannelObserver {
    tx: mpsc::UnboundedSender<usize>,
}

#[async_trait]
impl AssociationObserver for ChannelObserver {
    async fn associations_changed(
        &self,
        associations: &BTreeMap<String, Association>,
    ) -> anyhow::Result<()> {
        let _ = self.tx.send(associations.len());
        Ok(())
    }
}

struct FailingObserver;

#[async_trait]
impl AssociationObserver for FailingObserver {
    async fn associations_changed(&self, _: &BTreeMap<String, Association>) -> anyhow::Result<()> {
        anyhow::bail!("downstream offline")
    }
}

#[tokio::test]
async fn test_observer_receives_full_record_set() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let manager = manager().with_observer(Arc::new(ChannelObserver { tx }));

    manager.replace(&sig("a/1"), &update(json!({ "url": "u" }))).await.unwrap();
    let count = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
    assert_eq!(count, Some(1));

    manager.replace(&sig("b/1"), &update(json!({ "url": "v" }))).await.unwrap();
    let count = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
    assert_eq!(count, Some(2));
}

#[tokio::test]
async fn test_observer_failure_is_swallowed() {
    let manager = manager().with_observer(Arc::new(FailingObserver));
    let result = manager.replace(&sig("a/1"), &update(json!({ "url": "u" }))).await;
    assert!(result.is_ok());
}
