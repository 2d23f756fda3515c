//! Progress fan-out from worker slots to any number of subscribers.
//!
//! Each subscriber owns a bounded buffer. Publishing never waits: when a
//! subscriber's buffer is full the event is dropped for that subscriber only,
//! and subscribers whose receiving side is gone are pruned.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::job::{JobError, JobId, JobRecord, JobState};

/// Default number of undelivered events buffered per subscriber.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

/// One event on the push channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Progress {
        job_id: JobId,
        progress: u8,
    },
    Complete {
        job_id: JobId,
        state: JobState,
        progress: u8,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<JobError>,
    },
}

impl ProgressEvent {
    /// Terminal event for a finished job snapshot.
    pub fn complete(record: &JobRecord) -> Self {
        ProgressEvent::Complete {
            job_id: record.id.clone(),
            state: record.state,
            progress: record.progress,
            error: record.error.clone(),
        }
    }

    pub fn job_id(&self) -> &JobId {
        match self {
            ProgressEvent::Progress { job_id, .. } | ProgressEvent::Complete { job_id, .. } => {
                job_id
            }
        }
    }
}

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<ProgressEvent>,
    dropped: u64,
}

/// Fan-out channel. Cheap to share behind an `Arc`.
pub struct ProgressBroadcaster {
    subscribers: Mutex<Vec<Subscriber>>,
    buffer: usize,
    next_id: AtomicU64,
}

impl ProgressBroadcaster {
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            buffer: buffer.max(1),
            next_id: AtomicU64::new(1),
        }
    }

    /// Attach a subscriber. It sees only events published from now on.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().push(Subscriber { id, tx, dropped: 0 });
        tracing::debug!(subscriber = id, "progress subscriber attached");
        Subscription { id, rx }
    }

    /// Deliver `event` to every subscriber without blocking.
    pub fn publish(&self, event: ProgressEvent) {
        let mut subscribers = self.lock();
        subscribers.retain_mut(|sub| match sub.tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                sub.dropped += 1;
                tracing::trace!(
                    subscriber = sub.id,
                    dropped = sub.dropped,
                    "subscriber buffer full, event dropped"
                );
                true
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(subscriber = sub.id, "progress subscriber detached");
                false
            }
        });
    }

    /// Number of attached subscribers (closed ones are pruned on publish).
    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ProgressBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

/// Receiving end of one subscriber. Dropping it detaches the subscriber.
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<ProgressEvent>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next event, or `None` once the broadcaster is gone.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }

    /// Next buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<ProgressEvent> {
        self.rx.try_recv().ok()
    }
}
