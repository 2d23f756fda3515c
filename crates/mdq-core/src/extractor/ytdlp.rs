//! yt-dlp process adapter.

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tokio_util::sync::CancellationToken;

use super::parse::{parse_media_info, parse_progress_percent};
use super::process::{piped_command, ProcessGuard};
use super::{ExtractorAdapter, MediaInfo, ProgressSink, RetrievalOutcome, RetrievalRequest};
use crate::config::ExtractorConfig;
use crate::error::ExtractorError;

/// Runs the configured yt-dlp compatible binary as a child process.
#[derive(Debug, Clone)]
pub struct YtDlpAdapter {
    config: ExtractorConfig,
}

impl YtDlpAdapter {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    fn analyze_args(&self, url: &str) -> Vec<String> {
        let mut args = self.config.base_args.clone();
        args.extend([
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            url.to_string(),
        ]);
        args
    }

    fn retrieve_args(&self, request: &RetrievalRequest) -> Vec<String> {
        let output = self
            .config
            .output_dir
            .join(format!("{}.%(ext)s", request.job_id));
        let mut args = self.config.base_args.clone();
        args.extend([
            "-f".to_string(),
            request.format.clone(),
            "-o".to_string(),
            output.to_string_lossy().into_owned(),
            "--no-playlist".to_string(),
            "--newline".to_string(),
            "--progress".to_string(),
        ]);
        args.extend(self.config.extra_args.iter().cloned());
        args.push(request.url.clone());
        args
    }
}

/// Read one line, replacing invalid UTF-8. `None` at EOF or on a read error.
async fn next_line_lossy<R: AsyncBufRead + Unpin>(reader: &mut R, buf: &mut Vec<u8>) -> Option<String> {
    buf.clear();
    match reader.read_until(b'\n', buf).await {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(String::from_utf8_lossy(buf).into_owned()),
    }
}

/// Forward progress lines to the sink until EOF.
async fn pump_progress<R: AsyncRead + Unpin>(reader: R, sink: ProgressSink) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    while let Some(line) = next_line_lossy(&mut reader, &mut buf).await {
        if let Some(percent) = parse_progress_percent(&line) {
            sink.report(percent);
        }
    }
}

/// Forward progress lines and keep the last non-empty line for error reporting.
async fn pump_stderr<R: AsyncRead + Unpin>(reader: R, sink: ProgressSink) -> Option<String> {
    let mut last = None;
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    while let Some(line) = next_line_lossy(&mut reader, &mut buf).await {
        if let Some(percent) = parse_progress_percent(&line) {
            sink.report(percent);
            continue;
        }
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            last = Some(trimmed.to_string());
        }
    }
    last
}

#[async_trait]
impl ExtractorAdapter for YtDlpAdapter {
    async fn analyze(&self, url: &str) -> Result<MediaInfo, ExtractorError> {
        let output = piped_command(&self.config.binary_path, self.analyze_args(url))
            .output()
            .await
            .map_err(ExtractorError::Spawn)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .last()
                .map(str::to_string)
                .unwrap_or_else(|| format!("extractor exited with {}", output.status));
            tracing::debug!(url, %reason, "analysis failed");
            return Err(ExtractorError::Rejected(reason));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        // --dump-json prints one document per line; the first one describes the URL.
        let first = stdout.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
        parse_media_info(first)
    }

    async fn retrieve(
        &self,
        request: &RetrievalRequest,
        sink: ProgressSink,
        cancel: CancellationToken,
    ) -> RetrievalOutcome {
        if let Err(e) = tokio::fs::create_dir_all(&self.config.output_dir).await {
            return RetrievalOutcome::Failure(format!(
                "cannot create output dir {}: {}",
                self.config.output_dir.display(),
                e
            ));
        }

        let args = self.retrieve_args(request);
        tracing::info!(job_id = %request.job_id, ?args, "starting extractor");
        let child = match piped_command(&self.config.binary_path, &args).spawn() {
            Ok(child) => child,
            Err(e) => return RetrievalOutcome::Failure(ExtractorError::Spawn(e).to_string()),
        };
        let mut process = ProcessGuard::new(child);

        let stdout_task = process
            .child_mut()
            .stdout
            .take()
            .map(|out| tokio::spawn(pump_progress(out, sink.clone())));
        let stderr_task = process
            .child_mut()
            .stderr
            .take()
            .map(|err| tokio::spawn(pump_stderr(err, sink)));

        let status = tokio::select! {
            _ = cancel.cancelled() => None,
            status = process.wait() => Some(status),
        };
        let Some(status) = status else {
            process.terminate().await;
            tracing::info!(job_id = %request.job_id, "extractor terminated on cancel");
            return RetrievalOutcome::Cancelled;
        };

        if let Some(task) = stdout_task {
            let _ = task.await;
        }
        let last_stderr = match stderr_task {
            Some(task) => task.await.ok().flatten(),
            None => None,
        };

        match status {
            Ok(status) if status.success() => RetrievalOutcome::Success,
            Ok(status) => RetrievalOutcome::Failure(
                last_stderr.unwrap_or_else(|| format!("extractor exited with {}", status)),
            ),
            Err(e) => RetrievalOutcome::Failure(format!("waiting for extractor: {}", e)),
        }
    }
}
