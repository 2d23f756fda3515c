//! `mdq serve` – run the orchestrator behind the HTTP/WebSocket API until Ctrl-C.

use std::sync::Arc;

use anyhow::Result;
use mdq_core::config::MdqConfig;
use mdq_core::extractor::YtDlpAdapter;
use mdq_core::Orchestrator;

use crate::api::{ApiServer, ApiServerConfig, AppState};

/// Command-line values that take precedence over the config file and env.
#[derive(Debug, Default)]
pub struct ServeOverrides {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub jobs: Option<usize>,
}

impl ServeOverrides {
    fn apply(self, cfg: &mut MdqConfig) {
        if let Some(bind) = self.bind {
            cfg.server.bind_address = bind;
        }
        if let Some(port) = self.port {
            cfg.server.port = port;
        }
        if let Some(jobs) = self.jobs {
            cfg.max_concurrent = jobs.max(1);
        }
    }
}

pub async fn run_serve(mut cfg: MdqConfig, overrides: ServeOverrides) -> Result<()> {
    overrides.apply(&mut cfg);

    let adapter = Arc::new(YtDlpAdapter::new(cfg.extractor.clone()));
    let orchestrator = Arc::new(Orchestrator::from_config(&cfg, adapter));
    tracing::info!(
        max_concurrent = cfg.max_concurrent,
        extractor = %cfg.extractor.binary_path,
        output_dir = %cfg.extractor.output_dir.display(),
        "orchestrator started"
    );

    let server = ApiServer::new(
        ApiServerConfig::from(&cfg.server),
        AppState::new(Arc::clone(&orchestrator)),
    );
    let cancel = server.cancel_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("interrupt received"),
            Err(e) => tracing::warn!("cannot listen for Ctrl-C: {}", e),
        }
        cancel.cancel();
    });

    println!(
        "mdq listening on http://{}:{} ({} concurrent downloads)",
        cfg.server.bind_address, cfg.server.port, cfg.max_concurrent
    );
    let served = server.run().await;

    // Stop workers and tear down running extractors whether or not serving failed.
    orchestrator.shutdown().await;
    served
}
