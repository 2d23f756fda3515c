//! Job submission spec and its validation.

use serde::{Deserialize, Serialize};

use super::BatchId;
use crate::error::SubmitError;

/// Immutable description of one requested download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Source page or media URL.
    pub url: String,
    /// Requested container, e.g. `mp4`, `mp3`.
    pub format: String,
    /// Requested quality label, e.g. `720p`, `320kbps`.
    pub quality: String,
    /// Concrete extractor format id, when the caller already resolved one.
    /// Jobs with a format id skip the analysis step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_id: Option<String>,
    /// Batch this spec was submitted with, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<BatchId>,
}

impl JobSpec {
    pub fn new(url: impl Into<String>, format: impl Into<String>, quality: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            format: format.into(),
            quality: quality.into(),
            format_id: None,
            batch_id: None,
        }
    }

    pub fn with_format_id(mut self, format_id: impl Into<String>) -> Self {
        self.format_id = Some(format_id.into());
        self
    }

    /// Checks the spec and returns a normalized copy (fields trimmed, empty
    /// format id dropped).
    pub fn validated(&self) -> Result<JobSpec, SubmitError> {
        let url = validate_url(&self.url)?;
        let format = self.format.trim();
        if format.is_empty() {
            return Err(SubmitError::MissingField("format"));
        }
        let quality = self.quality.trim();
        if quality.is_empty() {
            return Err(SubmitError::MissingField("quality"));
        }
        Ok(JobSpec {
            url,
            format: format.to_string(),
            quality: quality.to_string(),
            format_id: self
                .format_id
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            batch_id: self.batch_id.clone(),
        })
    }
}

/// Accepts absolute `http`/`https` URLs with a host. Returns the trimmed URL.
pub fn validate_url(raw: &str) -> Result<String, SubmitError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SubmitError::MissingField("url"));
    }
    let invalid = |reason: String| SubmitError::InvalidUrl {
        url: trimmed.to_string(),
        reason,
    };
    let parsed = url::Url::parse(trimmed).map_err(|e| invalid(e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", parsed.scheme())));
    }
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(trimmed.to_string()),
        _ => Err(invalid("missing host".to_string())),
    }
}
