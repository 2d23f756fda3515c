//! Job queue and scheduler.
//!
//! Owns every job record. Pending jobs are dispatched FIFO by submission
//! order to at most `max_concurrent` workers at once. Taking a job and
//! counting it as active happen under the same lock, which is the single
//! serialization point for ownership transfer.

mod types;

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::Notify;

use crate::control::JobControl;
use crate::error::{QueueError, SubmitError};
use crate::job::{BatchId, JobId, JobRecord, JobSpec, JobState};

pub use types::{BatchSubmission, CancelOutcome, Claim, JobOutcome, QueueCounts};

/// Highest progress value an active job can report; 100 is reserved for completion.
const MAX_ACTIVE_PROGRESS: u8 = 99;

#[derive(Default)]
struct QueueState {
    records: HashMap<JobId, JobRecord>,
    pending: VecDeque<JobId>,
    active: usize,
    next_seq: u64,
    closed: bool,
}

impl QueueState {
    fn insert_pending(&mut self, spec: JobSpec) -> JobId {
        let id = JobId::generate();
        let seq = self.next_seq;
        self.next_seq += 1;
        self.records
            .insert(id.clone(), JobRecord::new_pending(id.clone(), spec, seq));
        self.pending.push_back(id.clone());
        id
    }
}

/// Shared job record set, pending list and admission counter.
pub struct JobQueue {
    state: Mutex<QueueState>,
    wake: Notify,
    control: JobControl,
    max_concurrent: usize,
}

impl JobQueue {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            wake: Notify::new(),
            control: JobControl::new(),
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Validate and enqueue one job. Never blocks on workers.
    pub fn submit(&self, spec: JobSpec) -> Result<JobId, SubmitError> {
        let spec = spec.validated()?;
        let id = {
            let mut state = self.lock();
            if state.closed {
                return Err(SubmitError::ShuttingDown);
            }
            state.insert_pending(spec)
        };
        tracing::debug!(job_id = %id, "job submitted");
        self.wake.notify_waiters();
        Ok(id)
    }

    /// Validate each spec independently and enqueue all valid ones under a
    /// shared batch id in a single critical section.
    pub fn submit_batch(&self, specs: Vec<JobSpec>) -> BatchSubmission {
        let batch_id = BatchId::generate();
        let validated: Vec<Result<JobSpec, SubmitError>> = specs
            .iter()
            .map(|spec| {
                spec.validated().map(|mut s| {
                    s.batch_id = Some(batch_id.clone());
                    s
                })
            })
            .collect();

        let results: Vec<Result<JobId, SubmitError>> = {
            let mut state = self.lock();
            let closed = state.closed;
            validated
                .into_iter()
                .map(|item| match item {
                    Ok(_) if closed => Err(SubmitError::ShuttingDown),
                    Ok(spec) => Ok(state.insert_pending(spec)),
                    Err(e) => Err(e),
                })
                .collect()
        };

        let accepted = results.iter().filter(|r| r.is_ok()).count();
        tracing::debug!(
            batch_id = %batch_id,
            accepted,
            rejected = results.len() - accepted,
            "batch submitted"
        );
        if accepted > 0 {
            self.wake.notify_waiters();
        }
        BatchSubmission { batch_id, results }
    }

    /// Cancel a job: pending jobs are cancelled immediately, active jobs are
    /// signalled, terminal jobs are left untouched.
    pub fn cancel(&self, id: &JobId) -> Result<CancelOutcome, QueueError> {
        let mut state = self.lock();
        let record = state
            .records
            .get_mut(id)
            .ok_or_else(|| QueueError::NotFound(id.clone()))?;
        match record.state {
            JobState::Pending => {
                record.state = JobState::Cancelled;
                record.finished = Some(Utc::now());
                state.pending.retain(|p| p != id);
                tracing::info!(job_id = %id, "pending job cancelled");
                Ok(CancelOutcome::Cancelled)
            }
            JobState::Active => {
                self.control.request_cancel(id);
                tracing::info!(job_id = %id, "cancellation requested for active job");
                Ok(CancelOutcome::Requested)
            }
            _ => Ok(CancelOutcome::AlreadyTerminal),
        }
    }

    /// Read-only snapshot of one job.
    pub fn status(&self, id: &JobId) -> Result<JobRecord, QueueError> {
        self.lock()
            .records
            .get(id)
            .cloned()
            .ok_or_else(|| QueueError::NotFound(id.clone()))
    }

    /// Snapshots of all jobs (optionally in one state), in submission order.
    pub fn list(&self, filter: Option<JobState>) -> Vec<JobRecord> {
        let mut records: Vec<JobRecord> = self
            .lock()
            .records
            .values()
            .filter(|r| filter.map_or(true, |s| r.state == s))
            .cloned()
            .collect();
        records.sort_by_key(|r| r.seq);
        records
    }

    /// Remove every completed, failed or cancelled record. Returns how many were removed.
    pub fn clear_terminal(&self) -> usize {
        let mut state = self.lock();
        let before = state.records.len();
        state.records.retain(|_, r| !r.is_terminal());
        let removed = before - state.records.len();
        if removed > 0 {
            tracing::debug!(removed, "cleared terminal jobs");
        }
        removed
    }

    pub fn counts(&self) -> QueueCounts {
        let state = self.lock();
        let mut counts = QueueCounts::default();
        for record in state.records.values() {
            match record.state {
                JobState::Pending => counts.pending += 1,
                JobState::Active => counts.active += 1,
                JobState::Completed => counts.completed += 1,
                JobState::Failed => counts.failed += 1,
                JobState::Cancelled => counts.cancelled += 1,
            }
        }
        counts
    }

    /// Take the oldest pending job if an admission slot is free.
    pub fn try_claim(&self) -> Option<Claim> {
        let mut state = self.lock();
        if state.closed || state.active >= self.max_concurrent {
            return None;
        }
        while let Some(id) = state.pending.pop_front() {
            let Some(record) = state.records.get_mut(&id) else {
                continue;
            };
            if record.state != JobState::Pending {
                continue;
            }
            record.state = JobState::Active;
            record.started = Some(Utc::now());
            let spec = record.spec.clone();
            state.active += 1;
            let cancel = self.control.register(&id);
            tracing::debug!(job_id = %id, active = state.active, "job claimed");
            return Some(Claim {
                job_id: id,
                spec,
                cancel,
            });
        }
        None
    }

    /// Wait until a job can be claimed. Returns `None` once the queue is closed.
    pub async fn claim_next(&self) -> Option<Claim> {
        loop {
            let notified = self.wake.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(claim) = self.try_claim() {
                return Some(claim);
            }
            if self.is_closed() {
                return None;
            }
            notified.await;
        }
    }

    /// Record a progress value for an owned job. Returns the stored value when
    /// it advanced, `None` when it was stale or the job is no longer active.
    pub fn record_progress(&self, claim: &Claim, percent: u8) -> Option<u8> {
        let percent = percent.min(MAX_ACTIVE_PROGRESS);
        let mut state = self.lock();
        let record = state.records.get_mut(&claim.job_id)?;
        if record.state != JobState::Active || percent <= record.progress {
            return None;
        }
        record.progress = percent;
        Some(percent)
    }

    /// Apply the terminal transition for an owned job and release its slot.
    /// Returns the final snapshot.
    pub fn finish(&self, claim: Claim, outcome: JobOutcome) -> Option<JobRecord> {
        let snapshot = {
            let mut state = self.lock();
            state.active = state.active.saturating_sub(1);
            self.control.unregister(&claim.job_id);
            let record = state.records.get_mut(&claim.job_id)?;
            let next = match &outcome {
                JobOutcome::Completed => JobState::Completed,
                JobOutcome::Failed(_) => JobState::Failed,
                JobOutcome::Cancelled => JobState::Cancelled,
            };
            if !record.state.can_transition_to(next) {
                tracing::warn!(
                    job_id = %claim.job_id,
                    from = %record.state,
                    to = %next,
                    "refused job state transition"
                );
                return Some(record.clone());
            }
            record.state = next;
            record.finished = Some(Utc::now());
            match outcome {
                JobOutcome::Completed => record.progress = 100,
                JobOutcome::Failed(err) => record.error = Some(err),
                JobOutcome::Cancelled => {}
            }
            record.clone()
        };
        self.wake.notify_waiters();
        Some(snapshot)
    }

    /// Stop dispatching: idle workers return from `claim_next`, new
    /// submissions are refused and every active job is asked to cancel.
    pub fn close(&self) {
        self.lock().closed = true;
        let signalled = self.control.cancel_all();
        tracing::info!(active = signalled, "job queue closed");
        self.wake.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests;
