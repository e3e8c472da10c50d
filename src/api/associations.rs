use crate::api::error::{status_code, ApiError};
use crate::api::params::QueryString;
use crate::association::{AssociationField, AssociationMap, AssociationUpdate, AssociationsManager};
use crate::signature::Signature;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::Arc;

/// Shared state for associations API
pub struct AssociationsAppState {
    pub associations: Arc<AssociationsManager>,
}

/// `{"associations": {signature: fields}}`
#[derive(Serialize)]
pub struct AssociationsResponse {
    pub associations: AssociationMap,
}

/// Create associations API router
pub fn create_associations_router(state: Arc<AssociationsAppState>) -> Router {
    Router::new()
        .route("/associations", get(list_associations))
        .route(
            "/associations/:id/:id_type",
            get(get_association).put(put_association).delete(delete_association),
        )
        .route(
            "/associations/:id/:id_type/:property",
            get(get_property).put(put_property).delete(delete_property),
        )
        .with_state(state)
}

fn parse_property(property: &str) -> Result<AssociationField, ApiError> {
    property.parse().map_err(ApiError::not_found)
}

/// GET /associations - filtered listing (`tag`, `directory`, `include`)
async fn list_associations(
    State(state): State<Arc<AssociationsAppState>>,
    Query(query): Query<QueryString>,
) -> Result<Json<AssociationsResponse>, ApiError> {
    let associations = state
        .associations
        .retrieve(None, None, &query.into_params())
        .await?;
    Ok(Json(AssociationsResponse { associations }))
}

/// GET /associations/:id/:type
async fn get_association(
    State(state): State<Arc<AssociationsAppState>>,
    Path((id, id_type)): Path<(String, String)>,
    Query(query): Query<QueryString>,
) -> Result<Json<AssociationsResponse>, ApiError> {
    let signature = Signature::new(&id, &id_type)?;
    let associations = state
        .associations
        .retrieve(Some(&signature), None, &query.into_params())
        .await?;
    Ok(Json(AssociationsResponse { associations }))
}

/// PUT /associations/:id/:type - partial replace, 201 on create
async fn put_association(
    State(state): State<Arc<AssociationsAppState>>,
    Path((id, id_type)): Path<(String, String)>,
    Json(update): Json<AssociationUpdate>,
) -> Result<(StatusCode, Json<AssociationsResponse>), ApiError> {
    let signature = Signature::new(&id, &id_type)?;
    replace(&state, &signature, update).await
}

/// DELETE /associations/:id/:type
async fn delete_association(
    State(state): State<Arc<AssociationsAppState>>,
    Path((id, id_type)): Path<(String, String)>,
) -> Result<Json<AssociationsResponse>, ApiError> {
    let signature = Signature::new(&id, &id_type)?;
    state.associations.remove(&signature, None).await?;
    Ok(Json(AssociationsResponse {
        associations: AssociationMap::new(),
    }))
}

/// GET /associations/:id/:type/:property
async fn get_property(
    State(state): State<Arc<AssociationsAppState>>,
    Path((id, id_type, property)): Path<(String, String, String)>,
) -> Result<Json<AssociationsResponse>, ApiError> {
    let signature = Signature::new(&id, &id_type)?;
    let property = parse_property(&property)?;
    let associations = state
        .associations
        .retrieve(Some(&signature), Some(property), &Default::default())
        .await?;
    Ok(Json(AssociationsResponse { associations }))
}

/// PUT /associations/:id/:type/:property - body carries that one field
async fn put_property(
    State(state): State<Arc<AssociationsAppState>>,
    Path((id, id_type, property)): Path<(String, String, String)>,
    Json(update): Json<AssociationUpdate>,
) -> Result<(StatusCode, Json<AssociationsResponse>), ApiError> {
    let signature = Signature::new(&id, &id_type)?;
    let property = parse_property(&property)?;
    replace(&state, &signature, update.retain_only(property)).await
}

/// DELETE /associations/:id/:type/:property
async fn delete_property(
    State(state): State<Arc<AssociationsAppState>>,
    Path((id, id_type, property)): Path<(String, String, String)>,
) -> Result<Json<AssociationsResponse>, ApiError> {
    let signature = Signature::new(&id, &id_type)?;
    let property = parse_property(&property)?;
    state.associations.remove(&signature, Some(property)).await?;
    Ok(Json(AssociationsResponse {
        associations: AssociationMap::new(),
    }))
}

async fn replace(
    state: &AssociationsAppState,
    signature: &Signature,
    update: AssociationUpdate,
) -> Result<(StatusCode, Json<AssociationsResponse>), ApiError> {
    let (record, status) = state.associations.replace(signature, &update).await?;

    let mut associations = AssociationMap::new();
    associations.insert(signature.to_string(), record.to_map());

    Ok((status_code(status), Json(AssociationsResponse { associations })))
}
