//! Request and response bodies of the HTTP API.

use mdq_core::error::SubmitError;
use mdq_core::job::{BatchId, JobError, JobId, JobRecord, JobSpec, JobState};
use mdq_core::queue::CancelOutcome;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub max_concurrent: usize,
    pub active: usize,
    pub pending: usize,
    pub subscribers: usize,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub quality: String,
    #[serde(default)]
    pub format_id: Option<String>,
}

impl DownloadRequest {
    pub fn into_spec(self) -> JobSpec {
        JobSpec {
            url: self.url,
            format: self.format,
            quality: self.quality,
            format_id: self.format_id,
            batch_id: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub job_id: JobId,
    pub state: JobState,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub quality: String,
}

/// Outcome of one URL in a batch, in request order.
#[derive(Debug, Serialize)]
pub struct BatchItem {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchItem {
    pub fn new(url: String, result: Result<JobId, SubmitError>) -> Self {
        match result {
            Ok(job_id) => Self {
                url,
                job_id: Some(job_id),
                error: None,
            },
            Err(e) => Self {
                url,
                job_id: None,
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub batch_id: BatchId,
    pub job_ids: Vec<JobId>,
    pub results: Vec<BatchItem>,
}

/// Compact status of one job.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub job_id: JobId,
    pub state: JobState,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
}

impl From<JobRecord> for StatusResponse {
    fn from(record: JobRecord) -> Self {
        Self {
            job_id: record.id,
            state: record.state,
            progress: record.progress,
            error: record.error,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub job_id: JobId,
    pub outcome: CancelOutcome,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub state: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub removed: usize,
}
