//! `mdq analyze <url>` – print metadata and formats for a URL.

use anyhow::Result;
use mdq_core::config::MdqConfig;
use mdq_core::extractor::{detect_platform, ExtractorAdapter, YtDlpAdapter};
use mdq_core::job::validate_url;

pub async fn run_analyze(cfg: &MdqConfig, url: &str) -> Result<()> {
    let url = validate_url(url)?;
    let adapter = YtDlpAdapter::new(cfg.extractor.clone());
    let info = adapter.analyze(&url).await?;

    println!("Title:     {}", info.title);
    println!("Platform:  {}", detect_platform(&url));
    println!("Duration:  {}", info.duration.as_deref().unwrap_or("-"));
    if let Some(thumb) = &info.thumbnail {
        println!("Thumbnail: {}", thumb);
    }
    if info.formats.is_empty() {
        println!("No formats listed.");
        return Ok(());
    }
    println!();
    println!("{:<12} {:<6} {:<12} {}", "FORMAT", "EXT", "QUALITY", "SIZE");
    for f in &info.formats {
        let size = f
            .approx_size_bytes
            .map(|b| format!("{:.1} MiB", b as f64 / 1_048_576.0))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<12} {:<6} {:<12} {}",
            f.format_id,
            f.container,
            f.resolution_or_bitrate.as_deref().unwrap_or("-"),
            size
        );
    }
    Ok(())
}
