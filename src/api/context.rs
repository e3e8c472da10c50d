use crate::api::error::ApiError;
use crate::api::params::QueryString;
use crate::context::{ContextManager, ContextSnapshot, DeviceSelector};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use std::sync::Arc;

/// Shared state for context API
pub struct ContextAppState {
    pub context: Arc<ContextManager>,
}

/// Create context API router
pub fn create_context_router(state: Arc<ContextAppState>) -> Router {
    Router::new()
        .route("/context", get(get_context))
        .route("/context/device/:id", get(get_device_by_identifier))
        .route("/context/device/:id/:id_type", get(get_device))
        .route("/context/directory/:directory", get(get_directory))
        .route("/context/tag/:tag", get(get_tag))
        .with_state(state)
}

/// GET /context - all devices, or those under one `directory` or `tag`
///
/// A selector takes a single value; `?tag=a,b` is rejected with 400.
async fn get_context(
    State(state): State<Arc<ContextAppState>>,
    Query(query): Query<QueryString>,
) -> Result<Json<ContextSnapshot>, ApiError> {
    let params = query.into_params();
    let directory = single_value("directory", &params.directory)?;
    let tag = single_value("tag", &params.tag)?;

    let selector = DeviceSelector::resolve(None, None, directory.as_deref(), tag.as_deref())?;
    Ok(Json(state.context.retrieve(&selector, &params).await?))
}

fn single_value(name: &str, list: &Option<Vec<String>>) -> Result<Option<String>, ApiError> {
    match list.as_deref() {
        None => Ok(None),
        Some([value]) => Ok(Some(value.clone())),
        Some(_) => Err(ApiError::bad_request(format!(
            "Only one '{}' may be given",
            name
        ))),
    }
}

/// GET /context/device/:id - every signature with this identifier
async fn get_device_by_identifier(
    State(state): State<Arc<ContextAppState>>,
    Path(id): Path<String>,
    Query(query): Query<QueryString>,
) -> Result<Json<ContextSnapshot>, ApiError> {
    let selector = DeviceSelector::resolve(Some(&id), None, None, None)?;
    Ok(Json(state.context.retrieve(&selector, &query.into_params()).await?))
}

/// GET /context/device/:id/:type
async fn get_device(
    State(state): State<Arc<ContextAppState>>,
    Path((id, id_type)): Path<(String, String)>,
    Query(query): Query<QueryString>,
) -> Result<Json<ContextSnapshot>, ApiError> {
    let selector = DeviceSelector::resolve(Some(&id), Some(&id_type), None, None)?;
    Ok(Json(state.context.retrieve(&selector, &query.into_params()).await?))
}

/// GET /context/directory/:directory
async fn get_directory(
    State(state): State<Arc<ContextAppState>>,
    Path(directory): Path<String>,
    Query(query): Query<QueryString>,
) -> Result<Json<ContextSnapshot>, ApiError> {
    let selector = DeviceSelector::Directory(directory);
    Ok(Json(state.context.retrieve(&selector, &query.into_params()).await?))
}

/// GET /context/tag/:tag
async fn get_tag(
    State(state): State<Arc<ContextAppState>>,
    Path(tag): Path<String>,
    Query(query): Query<QueryString>,
) -> Result<Json<ContextSnapshot>, ApiError> {
    let selector = DeviceSelector::Tag(tag);
    Ok(Json(state.context.retrieve(&selector, &query.into_params()).await?))
}
