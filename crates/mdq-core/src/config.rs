use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::broadcast::DEFAULT_SUBSCRIBER_BUFFER;

/// External extractor invocation (optional section in config.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Extractor executable, looked up in PATH when not absolute.
    pub binary_path: String,
    /// Arguments placed before the generated ones (e.g. a wrapper script).
    pub base_args: Vec<String>,
    /// Arguments appended to every retrieval (e.g. `--limit-rate 2M`).
    pub extra_args: Vec<String>,
    /// Directory downloaded files are written to.
    pub output_dir: PathBuf,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            binary_path: "yt-dlp".to_string(),
            base_args: Vec::new(),
            extra_args: Vec::new(),
            output_dir: PathBuf::from("downloads"),
        }
    }
}

/// HTTP API listener settings (optional section in config.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Allow cross-origin requests from a separately served frontend.
    pub enable_cors: bool,
    /// Requests admitted per client IP in each window; `0` disables limiting.
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 5000,
            enable_cors: true,
            rate_limit_requests: 100,
            rate_limit_window_secs: 60,
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Global configuration loaded from `~/.config/mdq/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MdqConfig {
    /// Maximum number of jobs downloading at once (worker pool size).
    pub max_concurrent: usize,
    /// Events buffered per progress subscriber before new ones are dropped.
    pub subscriber_buffer: usize,
    pub extractor: ExtractorConfig,
    pub server: ServerConfig,
}

impl Default for MdqConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
            extractor: ExtractorConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl MdqConfig {
    /// Apply `MDQ_BIND_ADDRESS` / `MDQ_PORT` overrides when set and valid.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(bind) = std::env::var("MDQ_BIND_ADDRESS") {
            if !bind.trim().is_empty() {
                self.server.bind_address = bind.trim().to_string();
            }
        }
        if let Ok(port) = std::env::var("MDQ_PORT") {
            match port.trim().parse::<u16>() {
                Ok(p) => self.server.port = p,
                Err(_) => tracing::warn!("ignoring invalid MDQ_PORT '{}'", port),
            }
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mdq")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from `path`, creating a default file if none exists.
pub fn load_or_init_at(path: &Path) -> Result<MdqConfig> {
    if !path.exists() {
        let default_cfg = MdqConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)?;
    let cfg: MdqConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}

/// Load configuration from the XDG config dir, creating a default file if none exists.
pub fn load_or_init() -> Result<MdqConfig> {
    load_or_init_at(&config_path()?)
}
