// Integration tests for the /context routes

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use perch::api::{create_context_router, ContextAppState};
use perch::association::{AssociationUpdate, AssociationsManager, SqliteAssociationStore};
use perch::context::ContextManager;
use perch::live::{LiveEvent, LiveStateEngine};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

async fn create_test_app(with_source: bool) -> Router {
    let store = Arc::new(SqliteAssociationStore::new(":memory:").unwrap());

    let associations = AssociationsManager::new(store.clone());
    let update: AssociationUpdate =
        serde_json::from_value(json!({ "directory": "site:zoneA", "tags": ["lobby"] })).unwrap();
    associations
        .replace(&"aa:bb/2".parse().unwrap(), &update)
        .await
        .unwrap();

    let mut context = ContextManager::new(store);
    if with_source {
        let engine = Arc::new(LiveStateEngine::new("primary", 16));
        engine.process_event(LiveEvent::new(
            "dynamb",
            "aa:bb/2".parse().unwrap(),
            json!({ "temperature": 21 }).as_object().unwrap().clone(),
        ));
        engine.process_event(LiveEvent::new(
            "dynamb",
            "cc:dd/2".parse().unwrap(),
            json!({ "temperature": 19 }).as_object().unwrap().clone(),
        ));
        context = context.with_primary(engine);
    }

    create_context_router(Arc::new(ContextAppState {
        context: Arc::new(context),
    }))
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_context_all_devices() {
    let app = create_test_app(true).await;
    let (status, body) = get(&app, "/context").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["devices"].as_object().unwrap().len(), 2);
    assert_eq!(body["devices"]["aa:bb/2"]["directory"], json!("site:zoneA"));
    assert_eq!(body["devices"]["aa:bb/2"]["temperature"], json!(21));
}

#[tokio::test]
async fn test_context_by_directory() {
    let app = create_test_app(true).await;

    let (status, body) = get(&app, "/context/directory/site").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["devices"]["aa:bb/2"].is_object());
    assert!(body["devices"].get("cc:dd/2").is_none());

    let (status, _) = get(&app, "/context/directory/site:zoneB").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = get(&app, "/context?directory=site").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["devices"].as_object().unwrap().len(), 1);
}

#[tokio::test]
async fn test_context_by_tag() {
    let app = create_test_app(true).await;

    let (status, body) = get(&app, "/context/tag/lobby?include=temperature").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["devices"]["aa:bb/2"], json!({ "temperature": 21 }));

    let (status, _) = get(&app, "/context/tag/nobody").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_context_query_selector_takes_one_value() {
    let app = create_test_app(true).await;

    let (status, body) = get(&app, "/context?tag=lobby,other").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = get(&app, "/context?directory=site,elsewhere").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get(&app, "/context?tag=").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["devices"].as_object().unwrap().len(), 2);
}

#[tokio::test]
async fn test_context_by_device() {
    let app = create_test_app(true).await;

    let (status, body) = get(&app, "/context/device/cc:dd/2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["devices"]["cc:dd/2"]["temperature"], json!(19));

    let (status, body) = get(&app, "/context/device/cc:dd").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["devices"]["cc:dd/2"].is_object());

    let (status, _) = get(&app, "/context/device/ee:ff/2").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_context_without_source_is_400() {
    let app = create_test_app(false).await;
    let (status, body) = get(&app, "/context").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}
