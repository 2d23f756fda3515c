//! `mdq download <url>` – run one job in the foreground and print its progress.

use std::sync::Arc;

use anyhow::{bail, Result};
use mdq_core::broadcast::ProgressEvent;
use mdq_core::config::MdqConfig;
use mdq_core::extractor::YtDlpAdapter;
use mdq_core::job::{JobSpec, JobState};
use mdq_core::Orchestrator;

pub async fn run_download(
    cfg: &MdqConfig,
    url: &str,
    format: &str,
    quality: &str,
    format_id: Option<String>,
) -> Result<()> {
    let adapter = Arc::new(YtDlpAdapter::new(cfg.extractor.clone()));
    let orchestrator = Orchestrator::start(1, cfg.subscriber_buffer, adapter);
    // Subscribe before submitting so no event for this job is missed.
    let mut events = orchestrator.subscribe();

    let mut spec = JobSpec::new(url, format, quality);
    spec.format_id = format_id;
    let job_id = orchestrator.submit(spec)?;
    println!("Queued {}", job_id);

    let mut cancelling = false;
    let finished = loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(ProgressEvent::Progress { job_id: id, progress }) if id == job_id => {
                    println!("  {:>3}%", progress);
                }
                Some(ProgressEvent::Complete { job_id: id, state, error, .. }) if id == job_id => {
                    break Some((state, error));
                }
                Some(_) => {}
                None => break None,
            },
            _ = tokio::signal::ctrl_c(), if !cancelling => {
                println!("Cancelling...");
                cancelling = true;
                orchestrator.cancel(&job_id)?;
            }
        }
    };
    orchestrator.shutdown().await;

    match finished {
        Some((JobState::Completed, _)) => {
            println!(
                "Done: {}",
                cfg.extractor.output_dir.join(format!("{}.*", job_id)).display()
            );
            Ok(())
        }
        Some((JobState::Cancelled, _)) => bail!("download {} cancelled", job_id),
        Some((_, Some(error))) => bail!("download {} failed: {}", job_id, error),
        Some((state, None)) => bail!("download {} ended in state {}", job_id, state),
        None => bail!("progress channel closed before {} finished", job_id),
    }
}
