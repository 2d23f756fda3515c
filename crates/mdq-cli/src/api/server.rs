//! API server setup: router, middleware and graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, Request};
use axum::http::{header, HeaderValue};
use axum::{middleware, Router};
use mdq_core::config::ServerConfig;
use mdq_core::Orchestrator;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::api::middleware::{rate_limit, RateLimiter};
use crate::api::routes;

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; style-src 'self' 'unsafe-inline'; \
     script-src 'self'; img-src 'self' data: https:";

/// Listener settings.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub enable_cors: bool,
    /// Requests per client IP per window; `0` disables limiting.
    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,
    pub max_body_bytes: usize,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for ApiServerConfig {
    fn from(cfg: &ServerConfig) -> Self {
        Self {
            bind_address: cfg.bind_address.clone(),
            port: cfg.port,
            enable_cors: cfg.enable_cors,
            rate_limit_requests: cfg.rate_limit_requests,
            rate_limit_window: Duration::from_secs(cfg.rate_limit_window_secs),
            max_body_bytes: cfg.max_body_bytes,
        }
    }
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Server start time for uptime calculation.
    pub start_time: Instant,
    pub orchestrator: Arc<Orchestrator>,
    /// Fired on server shutdown; long-lived connections watch it to close.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            start_time: Instant::now(),
            orchestrator,
            shutdown: CancellationToken::new(),
        }
    }
}

pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Token that stops the server when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.state.shutdown.clone()
    }

    /// The full application. Serve it with connect info so the rate limiter
    /// can see client addresses.
    pub fn build_router(&self) -> Router {
        let mut router = routes::create_router(self.state.clone())
            .layer(DefaultBodyLimit::max(self.config.max_body_bytes));

        if self.config.rate_limit_requests > 0 {
            let limiter = RateLimiter::new(
                self.config.rate_limit_requests,
                self.config.rate_limit_window,
            );
            router = router.layer(middleware::from_fn_with_state(limiter, rate_limit));
        }

        router = router
            .layer(SetResponseHeaderLayer::if_not_present(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                header::X_FRAME_OPTIONS,
                HeaderValue::from_static("SAMEORIGIN"),
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                header::REFERRER_POLICY,
                HeaderValue::from_static("no-referrer"),
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                header::CONTENT_SECURITY_POLICY,
                HeaderValue::from_static(CONTENT_SECURITY_POLICY),
            ))
            .layer(CompressionLayer::new());

        if self.config.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            router = router.layer(cors);
        }

        // Health probes are polled often; keep them out of the request log.
        router.layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    if req.uri().path() == "/api/health" {
                        Span::none()
                    } else {
                        tracing::info_span!("http", method = %req.method(), path = %req.uri().path())
                    }
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        if span.is_disabled() {
                            return;
                        }
                        tracing::debug!(
                            status = res.status().as_u16(),
                            latency_ms = latency.as_millis() as u64,
                            "response"
                        );
                    },
                ),
        )
    }

    /// Serve until the cancel token fires.
    pub async fn run(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .with_context(|| {
                format!(
                    "invalid listen address {}:{}",
                    self.config.bind_address, self.config.port
                )
            })?;

        let router = self.build_router();
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("bind {}", addr))?;

        tracing::info!("API server listening on http://{}", addr);

        let cancel_token = self.cancel_token();
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            cancel_token.cancelled().await;
            tracing::info!("API server shutting down");
        })
        .await
        .context("serve HTTP API")?;

        Ok(())
    }
}
