// HTTP and WebSocket transport

pub mod associations;
pub mod context;
mod error;
mod params;
pub mod websocket;

pub use associations::{create_associations_router, AssociationsAppState, AssociationsResponse};
pub use context::{create_context_router, ContextAppState};
pub use error::ApiError;
pub use params::QueryString;
pub use websocket::{create_ws_router, ws_handler, WsAppState};

use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Full application: associations, context, and WebSocket routes with CORS
pub fn create_app(
    associations: Arc<AssociationsAppState>,
    context: Arc<ContextAppState>,
    ws: Arc<WsAppState>,
) -> Router {
    Router::new()
        .merge(create_associations_router(associations))
        .merge(create_context_router(context))
        .merge(create_ws_router(ws))
        .layer(CorsLayer::permissive())
}
