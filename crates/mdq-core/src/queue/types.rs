//! Values exchanged between the queue, the worker pool and API callers.

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::SubmitError;
use crate::job::{BatchId, JobError, JobId, JobSpec};

/// Exclusive ownership of one active job, held by exactly one worker slot.
///
/// Not `Clone`: progress updates and the terminal transition require the
/// claim, so only the owning worker can mutate the job.
#[derive(Debug)]
pub struct Claim {
    pub(super) job_id: JobId,
    pub(super) spec: JobSpec,
    pub(super) cancel: CancellationToken,
}

impl Claim {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn spec(&self) -> &JobSpec {
        &self.spec
    }

    /// Token fired when the job is cancelled or the queue shuts down.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// How a worker ended a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed(JobError),
    Cancelled,
}

/// Result of a cancel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
    /// Job was pending and is now cancelled.
    Cancelled,
    /// Job is active; its worker has been signalled and will cancel it.
    Requested,
    /// Job had already reached a terminal state; nothing changed.
    AlreadyTerminal,
}

/// Per-item result of a batch submission, in input order.
#[derive(Debug, Clone)]
pub struct BatchSubmission {
    pub batch_id: BatchId,
    pub results: Vec<Result<JobId, SubmitError>>,
}

impl BatchSubmission {
    /// Ids of the items that were accepted.
    pub fn job_ids(&self) -> Vec<JobId> {
        self.results
            .iter()
            .filter_map(|r| r.as_ref().ok().cloned())
            .collect()
    }
}

/// Number of records per state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub pending: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}
