//! Job control for cancellation: shared per-job cancellation tokens.
//!
//! When a worker takes a job it is registered here with a fresh token. A
//! cancel request on that job fires the token; the worker observes it between
//! progress emissions and the extractor adapter tears its process down.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::job::JobId;

/// Shared registry of job id -> cancellation token for active jobs.
#[derive(Default)]
pub struct JobControl {
    jobs: Mutex<HashMap<JobId, CancellationToken>>,
}

impl JobControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an active job; returns the token handed to the worker.
    pub fn register(&self, job_id: &JobId) -> CancellationToken {
        let token = CancellationToken::new();
        self.lock().insert(job_id.clone(), token.clone());
        token
    }

    /// Unregister a job (call when the job reaches a terminal state).
    pub fn unregister(&self, job_id: &JobId) {
        self.lock().remove(job_id);
    }

    /// Request cancellation of an active job. Returns false when the job is
    /// not registered (never started or already finished).
    pub fn request_cancel(&self, job_id: &JobId) -> bool {
        match self.lock().get(job_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Request cancellation of every registered job (shutdown).
    pub fn cancel_all(&self) -> usize {
        let jobs = self.lock();
        for token in jobs.values() {
            token.cancel();
        }
        jobs.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<JobId, CancellationToken>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
