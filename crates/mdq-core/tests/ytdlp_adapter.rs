//! yt-dlp adapter against a fake extractor script.

#![cfg(unix)]

use std::path::Path;
use std::time::Duration;

use mdq_core::config::ExtractorConfig;
use mdq_core::error::ExtractorError;
use mdq_core::extractor::{
    progress_channel, ExtractorAdapter, RetrievalOutcome, RetrievalRequest, YtDlpAdapter,
};
use mdq_core::job::JobId;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const FAKE_YTDLP: &str = r#"
case " $* " in
  *" --dump-json "*)
    case " $* " in
      *private*) echo "ERROR: [youtube] abc: Private video" >&2; exit 1 ;;
    esac
    echo '{"title":"Clip","duration":65,"thumbnail":"https://img.example/t.jpg","formats":[{"format_id":"18","ext":"mp4","width":640,"height":360,"filesize":1000},{"format_id":"140","ext":"m4a","vcodec":"none","abr":129.5,"filesize_approx":800.0}]}'
    exit 0 ;;
esac
for arg; do url="$arg"; done
case "$url" in
  *fail*)
    echo "[download]  10.0% of 1.00MiB"
    echo "WARNING: retrying" >&2
    echo "ERROR: unable to download video data: HTTP Error 403" >&2
    exit 1 ;;
  *hang*)
    echo "[download]   5.0% of 1.00MiB"
    sleep 30
    exit 0 ;;
esac
echo "[info] Downloading format 18"
echo "[download]  25.0% of 1.00MiB at 1.00MiB/s ETA 00:01"
echo "[download]  50.5% of 1.00MiB at 1.00MiB/s ETA 00:01"
echo "[download] 100% of 1.00MiB in 00:01"
exit 0
"#;

/// Adapter running the fake script through `sh`, writing into a temp dir.
fn fake_adapter(dir: &Path) -> YtDlpAdapter {
    let script = dir.join("fake-yt-dlp.sh");
    std::fs::write(&script, FAKE_YTDLP).unwrap();
    YtDlpAdapter::new(ExtractorConfig {
        binary_path: "sh".into(),
        base_args: vec![script.to_string_lossy().into_owned()],
        extra_args: Vec::new(),
        output_dir: dir.join("downloads"),
    })
}

fn request(url: &str) -> RetrievalRequest {
    RetrievalRequest {
        job_id: JobId::from("dl_test"),
        url: url.into(),
        format: "18".into(),
        quality: "360p".into(),
    }
}

#[tokio::test]
async fn analyze_parses_dump_json() {
    let dir = TempDir::new().unwrap();
    let adapter = fake_adapter(dir.path());

    let info = adapter.analyze("https://a.example/watch").await.unwrap();
    assert_eq!(info.title, "Clip");
    assert_eq!(info.duration.as_deref(), Some("1:05"));
    assert_eq!(info.formats.len(), 2);
    assert_eq!(info.formats[0].resolution_or_bitrate.as_deref(), Some("640x360"));
    assert_eq!(info.formats[1].resolution_or_bitrate.as_deref(), Some("130kbps"));
    assert_eq!(info.formats[1].approx_size_bytes, Some(800));
}

#[tokio::test]
async fn analyze_reports_last_stderr_line() {
    let dir = TempDir::new().unwrap();
    let adapter = fake_adapter(dir.path());

    let err = adapter.analyze("https://a.example/private").await.unwrap_err();
    assert!(matches!(err, ExtractorError::Rejected(_)));
    assert_eq!(err.to_string(), "ERROR: [youtube] abc: Private video");
}

#[tokio::test]
async fn missing_binary_is_a_spawn_error() {
    let adapter = YtDlpAdapter::new(ExtractorConfig {
        binary_path: "/nonexistent/yt-dlp".into(),
        ..ExtractorConfig::default()
    });
    let err = adapter.analyze("https://a.example/x").await.unwrap_err();
    assert!(matches!(err, ExtractorError::Spawn(_)));
}

#[tokio::test]
async fn retrieve_streams_progress_and_succeeds() {
    let dir = TempDir::new().unwrap();
    let adapter = fake_adapter(dir.path());
    let (sink, mut rx) = progress_channel();

    let outcome = adapter
        .retrieve(&request("https://a.example/ok"), sink, CancellationToken::new())
        .await;
    assert_eq!(outcome, RetrievalOutcome::Success);

    assert_eq!(rx.latest(), 100);
    assert_eq!(rx.next().await, None);
    assert!(dir.path().join("downloads").is_dir());
}

#[tokio::test]
async fn retrieve_failure_keeps_extractor_message() {
    let dir = TempDir::new().unwrap();
    let adapter = fake_adapter(dir.path());
    let (sink, mut rx) = progress_channel();

    let outcome = adapter
        .retrieve(&request("https://a.example/fail"), sink, CancellationToken::new())
        .await;
    assert_eq!(
        outcome,
        RetrievalOutcome::Failure("ERROR: unable to download video data: HTTP Error 403".into())
    );
    assert_eq!(rx.latest(), 10);
}

#[tokio::test]
async fn cancel_terminates_extractor_process() {
    let dir = TempDir::new().unwrap();
    let adapter = fake_adapter(dir.path());
    let (sink, mut rx) = progress_channel();
    let cancel = CancellationToken::new();

    let req = request("https://a.example/hang");
    let retrieval = adapter.retrieve(&req, sink, cancel.clone());
    tokio::pin!(retrieval);

    let first = tokio::select! {
        p = rx.next() => p,
        outcome = &mut retrieval => panic!("finished early: {outcome:?}"),
    };
    assert_eq!(first, Some(5));

    cancel.cancel();
    let outcome = tokio::time::timeout(Duration::from_secs(5), retrieval)
        .await
        .expect("extractor torn down promptly");
    assert_eq!(outcome, RetrievalOutcome::Cancelled);
}
