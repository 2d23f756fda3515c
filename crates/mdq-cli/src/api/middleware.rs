//! Per-client request rate limiting.
//!
//! A fixed window per client IP: the first request opens a window, and
//! once `max_requests` have been admitted inside it further requests get a
//! 429 until the window expires.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::api::error::ApiError;

/// Windows are pruned once this many clients are tracked.
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    admitted: u32,
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<IpAddr, Window>>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window,
        }
    }

    /// Admit one request from `ip` at `now`. On rejection returns the whole
    /// seconds until the client's window resets (at least 1).
    pub fn check(&self, ip: IpAddr, now: Instant) -> Result<(), u64> {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        if windows.len() >= PRUNE_THRESHOLD {
            windows.retain(|_, w| now.duration_since(w.started) < self.window);
        }

        let entry = windows.entry(ip).or_insert(Window {
            started: now,
            admitted: 0,
        });
        let elapsed = now.duration_since(entry.started);
        if elapsed >= self.window {
            *entry = Window {
                started: now,
                admitted: 0,
            };
        }
        if entry.admitted >= self.max_requests {
            let remaining = self.window.saturating_sub(now.duration_since(entry.started));
            return Err(remaining.as_secs().max(1));
        }
        entry.admitted += 1;
        Ok(())
    }
}

/// Middleware function rejecting clients over their request budget.
pub async fn rate_limit(
    State(limiter): State<RateLimiter>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    match limiter.check(peer.ip(), Instant::now()) {
        Ok(()) => next.run(request).await,
        Err(retry_after_secs) => {
            tracing::warn!(ip = %peer.ip(), retry_after_secs, "rate limit exceeded");
            ApiError::too_many_requests("too many requests")
                .with_details(serde_json::json!({ "retry_after_secs": retry_after_secs }))
                .into_response()
        }
    }
}
