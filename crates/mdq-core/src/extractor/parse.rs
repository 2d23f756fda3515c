//! Parsing of yt-dlp output: `--dump-json` metadata and `--newline` progress lines.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use super::{FormatInfo, MediaInfo};
use crate::error::ExtractorError;

fn percent_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{1,3}(?:\.\d+)?)%").expect("valid progress regex"))
}

/// Extracts the percentage from a `[download]` progress line.
///
/// `[download]  45.3% of ~ 10.00MiB at 1.2MiB/s ETA 00:05` → `Some(45)`.
/// Lines that are not download progress yield `None`.
pub fn parse_progress_percent(line: &str) -> Option<u8> {
    if !line.trim_start().starts_with("[download]") {
        return None;
    }
    let caps = percent_regex().captures(line)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    if !(0.0..=100.0).contains(&value) {
        return None;
    }
    Some(value.floor() as u8)
}

#[derive(Debug, Deserialize)]
struct RawInfo {
    title: Option<String>,
    duration_string: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    format_id: String,
    ext: Option<String>,
    resolution: Option<String>,
    height: Option<u32>,
    width: Option<u32>,
    abr: Option<f64>,
    vcodec: Option<String>,
    filesize: Option<u64>,
    filesize_approx: Option<f64>,
}

impl RawFormat {
    fn resolution_or_bitrate(&self) -> Option<String> {
        let audio_only = self.vcodec.as_deref() == Some("none");
        if !audio_only {
            if let (Some(w), Some(h)) = (self.width, self.height) {
                return Some(format!("{w}x{h}"));
            }
            if let Some(res) = self.resolution.as_deref().filter(|r| r.contains('x')) {
                return Some(res.to_string());
            }
        }
        self.abr
            .filter(|abr| *abr > 0.0)
            .map(|abr| format!("{}kbps", abr.round() as u64))
    }

    fn into_format_info(self) -> FormatInfo {
        FormatInfo {
            resolution_or_bitrate: self.resolution_or_bitrate(),
            approx_size_bytes: self
                .filesize
                .or_else(|| self.filesize_approx.map(|s| s.max(0.0) as u64)),
            container: self.ext.unwrap_or_else(|| "unknown".to_string()),
            format_id: self.format_id,
        }
    }
}

/// Formats whole seconds as `H:MM:SS` or `M:SS`.
fn format_duration(secs: f64) -> String {
    let total = secs.max(0.0).round() as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

/// Parses the JSON document printed by `yt-dlp --dump-json`.
pub(super) fn parse_media_info(json: &str) -> Result<MediaInfo, ExtractorError> {
    let raw: RawInfo = serde_json::from_str(json.trim())?;
    Ok(MediaInfo {
        title: raw.title.unwrap_or_default(),
        duration: raw
            .duration_string
            .or_else(|| raw.duration.map(format_duration)),
        thumbnail: raw.thumbnail,
        formats: raw
            .formats
            .into_iter()
            .map(RawFormat::into_format_info)
            .collect(),
    })
}
