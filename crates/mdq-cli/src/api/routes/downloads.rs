//! Job submission, status, cancellation and listing routes.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use mdq_core::error::SubmitError;
use mdq_core::job::{JobId, JobRecord, JobSpec, JobState};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{
    BatchItem, BatchRequest, BatchResponse, CancelResponse, ClearResponse, DownloadRequest,
    DownloadResponse, ListQuery, StatusResponse,
};
use crate::api::server::AppState;

/// Routes under `/api/download`.
pub fn download_router() -> Router<AppState> {
    Router::new()
        .route("/", post(submit))
        .route("/batch", post(submit_batch))
        .route("/{id}/status", get(status))
        .route("/{id}", delete(cancel))
}

/// Routes under `/api/downloads`.
pub fn list_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/clear", post(clear))
}

async fn submit(
    State(state): State<AppState>,
    body: Result<Json<DownloadRequest>, JsonRejection>,
) -> ApiResult<Json<DownloadResponse>> {
    let Json(body) = body?;
    let job_id = state.orchestrator.submit(body.into_spec())?;
    tracing::info!(job_id = %job_id, "download queued");
    Ok(Json(DownloadResponse {
        job_id,
        state: JobState::Pending,
    }))
}

async fn submit_batch(
    State(state): State<AppState>,
    body: Result<Json<BatchRequest>, JsonRejection>,
) -> ApiResult<Json<BatchResponse>> {
    let Json(body) = body?;
    if body.urls.is_empty() {
        return Err(ApiError::bad_request("urls must be a non-empty list"));
    }
    for (field, value) in [("format", &body.format), ("quality", &body.quality)] {
        if value.trim().is_empty() {
            return Err(SubmitError::MissingField(field).into());
        }
    }
    let specs = body
        .urls
        .iter()
        .map(|url| JobSpec::new(url.as_str(), body.format.as_str(), body.quality.as_str()))
        .collect();
    let submission = state.orchestrator.submit_batch(specs);
    let job_ids = submission.job_ids();
    tracing::info!(
        batch_id = %submission.batch_id,
        queued = job_ids.len(),
        requested = body.urls.len(),
        "batch queued"
    );
    let results = body
        .urls
        .into_iter()
        .zip(submission.results)
        .map(|(url, result)| BatchItem::new(url, result))
        .collect();
    Ok(Json(BatchResponse {
        batch_id: submission.batch_id,
        job_ids,
        results,
    }))
}

async fn status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    let record = state.orchestrator.status(&JobId::from(id))?;
    Ok(Json(record.into()))
}

async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CancelResponse>> {
    let job_id = JobId::from(id);
    let outcome = state.orchestrator.cancel(&job_id)?;
    Ok(Json(CancelResponse { job_id, outcome }))
}

async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<JobRecord>>> {
    let filter = match query.state.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => None,
        Some(raw) => Some(JobState::parse(raw).ok_or_else(|| {
            ApiError::bad_request(format!("unknown state '{}'", raw)).with_details(
                serde_json::json!({
                    "allowed": ["pending", "active", "completed", "failed", "cancelled"]
                }),
            )
        })?),
    };
    Ok(Json(state.orchestrator.list(filter)))
}

async fn clear(State(state): State<AppState>) -> Json<ClearResponse> {
    let removed = state.orchestrator.clear_terminal();
    Json(ClearResponse { removed })
}
