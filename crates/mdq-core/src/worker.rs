//! Worker pool: a fixed number of slots that drive claimed jobs through the
//! extractor adapter.
//!
//! Each slot loops: claim the oldest pending job (waiting when there is none),
//! drive it to a terminal outcome, release it, claim the next one. Job
//! failures and adapter panics are recorded on the job and never stop a slot.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinSet;

use crate::broadcast::{ProgressBroadcaster, ProgressEvent};
use crate::extractor::{
    format_selector, progress_channel, ExtractorAdapter, RetrievalOutcome, RetrievalRequest,
};
use crate::job::JobError;
use crate::queue::{Claim, JobOutcome, JobQueue};

/// Handles of the running worker slots.
pub struct WorkerPool {
    slots: JoinSet<()>,
    size: usize,
}

impl WorkerPool {
    /// Spawn `size` slots on the current tokio runtime.
    pub fn spawn(
        size: usize,
        queue: Arc<JobQueue>,
        adapter: Arc<dyn ExtractorAdapter>,
        broadcaster: Arc<ProgressBroadcaster>,
    ) -> Self {
        let size = size.max(1);
        let mut slots = JoinSet::new();
        for index in 0..size {
            let slot = Slot {
                index,
                queue: Arc::clone(&queue),
                adapter: Arc::clone(&adapter),
                broadcaster: Arc::clone(&broadcaster),
            };
            slots.spawn(slot.run());
        }
        tracing::info!(slots = size, "worker pool started");
        Self { slots, size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Wait for every slot to exit. Slots exit once the queue is closed and
    /// their current job (if any) has finished.
    pub async fn join(mut self) {
        while let Some(res) = self.slots.join_next().await {
            if let Err(e) = res {
                tracing::warn!("worker slot join: {}", e);
            }
        }
        tracing::info!("worker pool stopped");
    }
}

struct Slot {
    index: usize,
    queue: Arc<JobQueue>,
    adapter: Arc<dyn ExtractorAdapter>,
    broadcaster: Arc<ProgressBroadcaster>,
}

impl Slot {
    async fn run(self) {
        tracing::debug!(slot = self.index, "worker slot ready");
        while let Some(claim) = self.queue.claim_next().await {
            tracing::info!(slot = self.index, job_id = %claim.job_id(), url = %claim.spec().url, "job started");
            let outcome = AssertUnwindSafe(self.drive(&claim))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    tracing::error!(job_id = %claim.job_id(), "extractor panicked");
                    JobOutcome::Failed(JobError::retrieval("extractor panicked"))
                });
            let job_id = claim.job_id().clone();
            match self.queue.finish(claim, outcome) {
                Some(record) => {
                    tracing::info!(
                        slot = self.index,
                        job_id = %record.id,
                        state = %record.state,
                        progress = record.progress,
                        "job finished"
                    );
                    self.broadcaster.publish(ProgressEvent::complete(&record));
                }
                None => tracing::warn!(job_id = %job_id, "finished job missing from queue"),
            }
        }
        tracing::debug!(slot = self.index, "worker slot exiting");
    }

    /// Run analysis (when needed) and retrieval for one owned job.
    async fn drive(&self, claim: &Claim) -> JobOutcome {
        let spec = claim.spec();
        if claim.is_cancelled() {
            return JobOutcome::Cancelled;
        }

        let format = match &spec.format_id {
            Some(id) => id.clone(),
            None => {
                let analysis = tokio::select! {
                    _ = claim.cancel_token().cancelled() => return JobOutcome::Cancelled,
                    analysis = self.adapter.analyze(&spec.url) => analysis,
                };
                match analysis {
                    Ok(info) => format_selector(&info.formats, &spec.format, &spec.quality),
                    Err(e) => {
                        tracing::warn!(job_id = %claim.job_id(), "analysis failed: {}", e);
                        return JobOutcome::Failed(JobError::analysis(e.to_string()));
                    }
                }
            }
        };
        if claim.is_cancelled() {
            return JobOutcome::Cancelled;
        }

        let request = RetrievalRequest {
            job_id: claim.job_id().clone(),
            url: spec.url.clone(),
            format,
            quality: spec.quality.clone(),
        };
        let (sink, mut progress_rx) = progress_channel();
        let retrieval = self
            .adapter
            .retrieve(&request, sink, claim.cancel_token().clone());
        tokio::pin!(retrieval);

        let mut progress_open = true;
        let outcome = loop {
            tokio::select! {
                biased;
                percent = progress_rx.next(), if progress_open => match percent {
                    Some(percent) => {
                        self.apply_progress(claim, percent);
                        if claim.is_cancelled() {
                            // Dropping the retrieval tears the extractor process down.
                            return JobOutcome::Cancelled;
                        }
                    }
                    None => progress_open = false,
                },
                outcome = &mut retrieval => break outcome,
            }
        };
        let percent = progress_rx.latest();
        self.apply_progress(claim, percent);

        match outcome {
            RetrievalOutcome::Success => JobOutcome::Completed,
            RetrievalOutcome::Cancelled => JobOutcome::Cancelled,
            RetrievalOutcome::Failure(_) if claim.is_cancelled() => JobOutcome::Cancelled,
            RetrievalOutcome::Failure(reason) => {
                tracing::warn!(job_id = %claim.job_id(), "retrieval failed: {}", reason);
                JobOutcome::Failed(JobError::retrieval(reason))
            }
        }
    }

    fn apply_progress(&self, claim: &Claim, percent: u8) {
        if let Some(progress) = self.queue.record_progress(claim, percent) {
            self.broadcaster.publish(ProgressEvent::Progress {
                job_id: claim.job_id().clone(),
                progress,
            });
        }
    }
}
