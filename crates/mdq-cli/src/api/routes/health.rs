//! Health check route.

use axum::{extract::State, routing::get, Json, Router};

use crate::api::models::HealthResponse;
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let orchestrator = &state.orchestrator;
    let counts = orchestrator.counts();
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        max_concurrent: orchestrator.max_concurrent(),
        active: counts.active,
        pending: counts.pending,
        subscribers: orchestrator.subscriber_count(),
    })
}
