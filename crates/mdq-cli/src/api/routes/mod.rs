//! API route modules, one per resource.

pub mod analyze;
pub mod downloads;
pub mod health;
pub mod ws;

use axum::http::Uri;
use axum::Router;

use crate::api::error::ApiError;
use crate::api::server::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/health", health::router())
        .nest("/api/analyze", analyze::router())
        .nest("/api/download", downloads::download_router())
        .nest("/api/downloads", downloads::list_router())
        .nest("/ws", ws::router())
        .fallback(endpoint_not_found)
        .with_state(state)
}

async fn endpoint_not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("endpoint not found: {}", uri.path()))
}
