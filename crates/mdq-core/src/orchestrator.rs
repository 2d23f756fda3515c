//! Facade wiring the queue, worker pool, broadcaster and extractor together.
//!
//! Outer surfaces (HTTP, CLI) only talk to [`Orchestrator`].

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::broadcast::{ProgressBroadcaster, Subscription};
use crate::config::MdqConfig;
use crate::error::{AnalyzeError, QueueError, SubmitError};
use crate::extractor::{detect_platform, ExtractorAdapter, MediaInfo, Platform};
use crate::job::{validate_url, JobId, JobRecord, JobSpec, JobState};
use crate::queue::{BatchSubmission, CancelOutcome, JobQueue, QueueCounts};
use crate::worker::WorkerPool;

/// Result of a synchronous analyze request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Analysis {
    pub url: String,
    pub platform: Platform,
    #[serde(flatten)]
    pub info: MediaInfo,
}

pub struct Orchestrator {
    queue: Arc<JobQueue>,
    broadcaster: Arc<ProgressBroadcaster>,
    adapter: Arc<dyn ExtractorAdapter>,
    pool: Mutex<Option<WorkerPool>>,
}

impl Orchestrator {
    /// Start `max_concurrent` worker slots on the current runtime.
    pub fn start(
        max_concurrent: usize,
        subscriber_buffer: usize,
        adapter: Arc<dyn ExtractorAdapter>,
    ) -> Self {
        let queue = Arc::new(JobQueue::new(max_concurrent));
        let broadcaster = Arc::new(ProgressBroadcaster::new(subscriber_buffer));
        let pool = WorkerPool::spawn(
            queue.max_concurrent(),
            Arc::clone(&queue),
            Arc::clone(&adapter),
            Arc::clone(&broadcaster),
        );
        Self {
            queue,
            broadcaster,
            adapter,
            pool: Mutex::new(Some(pool)),
        }
    }

    pub fn from_config(cfg: &MdqConfig, adapter: Arc<dyn ExtractorAdapter>) -> Self {
        Self::start(cfg.max_concurrent, cfg.subscriber_buffer, adapter)
    }

    pub fn max_concurrent(&self) -> usize {
        self.queue.max_concurrent()
    }

    /// Resolve metadata and formats for `url` without creating a job.
    pub async fn analyze(&self, url: &str) -> Result<Analysis, AnalyzeError> {
        let url = validate_url(url)?;
        let info = self.adapter.analyze(&url).await?;
        Ok(Analysis {
            platform: detect_platform(&url),
            url,
            info,
        })
    }

    pub fn submit(&self, spec: JobSpec) -> Result<JobId, SubmitError> {
        self.queue.submit(spec)
    }

    pub fn submit_batch(&self, specs: Vec<JobSpec>) -> BatchSubmission {
        self.queue.submit_batch(specs)
    }

    pub fn cancel(&self, id: &JobId) -> Result<CancelOutcome, QueueError> {
        self.queue.cancel(id)
    }

    pub fn status(&self, id: &JobId) -> Result<JobRecord, QueueError> {
        self.queue.status(id)
    }

    pub fn list(&self, filter: Option<JobState>) -> Vec<JobRecord> {
        self.queue.list(filter)
    }

    pub fn clear_terminal(&self) -> usize {
        self.queue.clear_terminal()
    }

    pub fn counts(&self) -> QueueCounts {
        self.queue.counts()
    }

    /// Attach a progress subscriber; it only sees events from now on.
    pub fn subscribe(&self) -> Subscription {
        self.broadcaster.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.broadcaster.subscriber_count()
    }

    /// Stop accepting jobs, cancel active ones and wait for the worker slots
    /// to exit. Calling it again is a no-op.
    pub async fn shutdown(&self) {
        self.queue.close();
        let pool = self
            .pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(pool) = pool {
            tracing::info!(slots = pool.size(), "waiting for worker slots");
            pool.join().await;
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        // Idle slots would otherwise wait on the queue forever.
        self.queue.close();
    }
}
