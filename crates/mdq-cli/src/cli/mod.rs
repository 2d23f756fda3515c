//! CLI for the MDQ media download queue.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mdq_core::config;

use commands::{run_analyze, run_download, run_serve, ServeOverrides};

/// Top-level CLI for the MDQ media download queue.
#[derive(Debug, Parser)]
#[command(name = "mdq")]
#[command(about = "MDQ: concurrent media download queue with live progress", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run the HTTP API and WebSocket progress server.
    Serve {
        /// Address to listen on (overrides config and MDQ_BIND_ADDRESS).
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
        /// Port to listen on (overrides config and MDQ_PORT).
        #[arg(long, short)]
        port: Option<u16>,
        /// Maximum number of concurrent downloads.
        #[arg(long, short, value_name = "N")]
        jobs: Option<usize>,
    },

    /// Show title, duration and available formats for a URL.
    Analyze {
        /// Page or media URL.
        url: String,
    },

    /// Download one URL in the foreground, printing progress.
    Download {
        /// Page or media URL.
        url: String,
        /// Container, e.g. mp4, webm, m4a.
        #[arg(long, default_value = "mp4")]
        format: String,
        /// Quality label, e.g. 720p or 128kbps.
        #[arg(long, default_value = "best")]
        quality: String,
        /// Extractor format id; skips format selection.
        #[arg(long, value_name = "ID")]
        format_id: Option<String>,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let mut cfg = config::load_or_init()?;
        cfg.apply_env_overrides();
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Serve { bind, port, jobs } => {
                run_serve(cfg, ServeOverrides { bind, port, jobs }).await?
            }
            CliCommand::Analyze { url } => run_analyze(&cfg, &url).await?,
            CliCommand::Download {
                url,
                format,
                quality,
                format_id,
            } => run_download(&cfg, &url, &format, &quality, format_id).await?,
        }

        Ok(())
    }
}
