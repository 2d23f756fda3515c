//! Extractor adapter: the boundary to the external media extraction tool.
//!
//! The core only relies on [`ExtractorAdapter`]: `analyze` resolves metadata
//! and available formats for a URL, `retrieve` downloads content while
//! reporting progress through a [`ProgressSink`] and honouring a
//! cancellation token. [`YtDlpAdapter`] is the process-backed implementation.

mod parse;
mod platform;
mod process;
mod select;
mod ytdlp;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::ExtractorError;
use crate::job::JobId;

pub use parse::parse_progress_percent;
pub use platform::{detect_platform, Platform};
pub use select::{format_selector, quality_matches};
pub use ytdlp::YtDlpAdapter;

/// One downloadable rendition of a media item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatInfo {
    pub format_id: String,
    /// Container / file extension, e.g. `mp4`, `webm`, `m4a`.
    pub container: String,
    /// `1280x720` for video, `128kbps` for audio-only formats.
    pub resolution_or_bitrate: Option<String>,
    pub approx_size_bytes: Option<u64>,
}

/// Metadata resolved for a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaInfo {
    pub title: String,
    /// Human-readable duration, e.g. `3:45`.
    pub duration: Option<String>,
    pub thumbnail: Option<String>,
    pub formats: Vec<FormatInfo>,
}

/// What to retrieve for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalRequest {
    pub job_id: JobId,
    pub url: String,
    /// Extractor format id or selector expression.
    pub format: String,
    pub quality: String,
}

/// Terminal result of a retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalOutcome {
    Success,
    /// Adapter-supplied reason, kept verbatim.
    Failure(String),
    /// The cancellation token fired and the retrieval was torn down.
    Cancelled,
}

/// Sending half of a job's progress channel, handed to the adapter.
///
/// Reporting never blocks. The channel holds a single slot carrying the
/// highest value reported so far, so a burst of reports collapses into its
/// latest value and the worker never reads a stale one.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    tx: Arc<watch::Sender<u8>>,
}

impl ProgressSink {
    /// Report a percentage in `0..=100` (larger values are clamped).
    /// Values not above the last reported one are ignored.
    pub fn report(&self, percent: u8) {
        let percent = percent.min(100);
        self.tx.send_if_modified(|current| {
            if percent > *current {
                *current = percent;
                true
            } else {
                false
            }
        });
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half of a job's progress channel, owned by the worker slot.
#[derive(Debug)]
pub struct ProgressReceiver {
    rx: watch::Receiver<u8>,
}

impl ProgressReceiver {
    /// Wait for a value newer than the last one seen. Returns `None` once
    /// every sink is dropped and nothing unseen remains.
    pub async fn next(&mut self) -> Option<u8> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }

    /// Highest value reported so far, marking it seen.
    pub fn latest(&mut self) -> u8 {
        *self.rx.borrow_and_update()
    }
}

/// Create a per-job progress channel.
pub fn progress_channel() -> (ProgressSink, ProgressReceiver) {
    let (tx, rx) = watch::channel(0);
    (ProgressSink { tx: Arc::new(tx) }, ProgressReceiver { rx })
}

/// Narrow contract to the external extraction tool.
#[async_trait]
pub trait ExtractorAdapter: Send + Sync {
    /// Resolve title, duration, thumbnail and formats for `url`.
    async fn analyze(&self, url: &str) -> Result<MediaInfo, ExtractorError>;

    /// Download `request`, reporting monotonic progress through `sink`.
    /// Must stop and tear down any external process when `cancel` fires.
    async fn retrieve(
        &self,
        request: &RetrievalRequest,
        sink: ProgressSink,
        cancel: CancellationToken,
    ) -> RetrievalOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn burst_collapses_to_highest_value() {
        let (sink, mut rx) = progress_channel();
        for percent in 1..=80 {
            sink.report(percent);
        }
        sink.report(40);
        assert_eq!(rx.next().await, Some(80));
        assert_eq!(rx.latest(), 80);

        sink.report(250);
        assert_eq!(rx.next().await, Some(100));
    }

    #[tokio::test]
    async fn unseen_value_survives_dropped_sink() {
        let (sink, mut rx) = progress_channel();
        let clone = sink.clone();
        sink.report(30);
        drop(sink);
        clone.report(60);
        drop(clone);
        assert_eq!(rx.next().await, Some(60));
        assert_eq!(rx.next().await, None);
    }

    #[test]
    fn sink_reports_closed_receiver() {
        let (sink, rx) = progress_channel();
        assert!(!sink.is_closed());
        drop(rx);
        assert!(sink.is_closed());
    }
}
