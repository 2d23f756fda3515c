//! Choosing an extractor format for a requested container and quality.

use super::FormatInfo;

enum QualityLabel {
    Height(u32),
    Kbps(u32),
}

fn parse_quality(quality: &str) -> Option<QualityLabel> {
    let q = quality.trim().to_ascii_lowercase();
    if let Some(kbps) = q.strip_suffix("kbps").or_else(|| q.strip_suffix("k")) {
        return kbps.trim().parse().ok().map(QualityLabel::Kbps);
    }
    if let Some(height) = q.strip_suffix('p') {
        return height.trim().parse().ok().map(QualityLabel::Height);
    }
    None
}

/// Whether a format's `resolution_or_bitrate` satisfies a quality label
/// (`720p` matches `1280x720`, `128kbps` matches `128kbps`).
pub fn quality_matches(resolution_or_bitrate: Option<&str>, quality: &str) -> bool {
    let (Some(res), Some(label)) = (resolution_or_bitrate, parse_quality(quality)) else {
        return false;
    };
    match label {
        QualityLabel::Height(h) => res
            .split_once('x')
            .and_then(|(_, height)| height.trim().parse::<u32>().ok())
            == Some(h),
        QualityLabel::Kbps(k) => res
            .strip_suffix("kbps")
            .and_then(|v| v.trim().parse::<u32>().ok())
            == Some(k),
    }
}

/// Resolve the format argument passed to retrieval.
///
/// Prefers a format of the requested container whose quality matches, then
/// the largest format of that container, then a selector expression the
/// extractor resolves itself.
pub fn format_selector(formats: &[FormatInfo], container: &str, quality: &str) -> String {
    let container = container.trim();
    let same_container: Vec<&FormatInfo> = formats
        .iter()
        .filter(|f| f.container.eq_ignore_ascii_case(container))
        .collect();

    if let Some(exact) = same_container
        .iter()
        .find(|f| quality_matches(f.resolution_or_bitrate.as_deref(), quality))
    {
        return exact.format_id.clone();
    }
    if let Some(largest) = same_container
        .iter()
        .max_by_key(|f| f.approx_size_bytes.unwrap_or(0))
    {
        return largest.format_id.clone();
    }
    format!("best[ext={container}]/best")
}
