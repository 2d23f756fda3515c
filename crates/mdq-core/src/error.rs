//! Error types surfaced by the orchestration core.
//!
//! Validation and lookup errors are returned synchronously to callers.
//! Extractor errors never cross the worker boundary: they are recorded on the
//! job (see [`crate::job::JobError`]) and only observed via status or events.

use thiserror::Error;

use crate::job::JobId;

/// Rejection of a submitted job spec. The job is never created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("missing {0}")]
    MissingField(&'static str),

    #[error("orchestrator is shutting down")]
    ShuttingDown,
}

/// Errors returned by queue operations that reference a job by id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("job {0} not found")]
    NotFound(JobId),
}

/// Failure reported by an extractor adapter.
#[derive(Debug, Error)]
pub enum ExtractorError {
    /// The extractor could not be started (binary missing, permissions).
    #[error("failed to launch extractor: {0}")]
    Spawn(#[source] std::io::Error),

    /// The extractor ran but reported an error for this URL.
    #[error("{0}")]
    Rejected(String),

    /// The extractor's metadata output could not be parsed.
    #[error("unreadable extractor output: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failure of a synchronous analyze request.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error(transparent)]
    InvalidUrl(#[from] SubmitError),

    #[error("analysis failed: {0}")]
    Extractor(#[from] ExtractorError),
}
