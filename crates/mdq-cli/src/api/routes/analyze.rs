use axum::{extract::State, routing::post, Json, Router};
use mdq_core::Analysis;

use crate::api::error::ApiResult;
use crate::api::models::AnalyzeRequest;
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(analyze))
}

/// Resolve metadata and formats for a URL without queueing anything.
async fn analyze(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeRequest>,
) -> ApiResult<Json<Analysis>> {
    let analysis = state.orchestrator.analyze(&body.url).await?;
    tracing::debug!(
        url = %analysis.url,
        platform = %analysis.platform,
        formats = analysis.info.formats.len(),
        "analyzed"
    );
    Ok(Json(analysis))
}
