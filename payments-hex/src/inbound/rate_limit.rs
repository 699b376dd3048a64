//! Rate limiting middleware using Governor.
//!
//! Implements per-caller rate limiting with a token bucket algorithm.

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    DefaultKeyedRateLimiter, Quota, RateLimiter,
    clock::{Clock, DefaultClock},
};
use serde_json::json;
use std::{num::NonZeroU32, sync::Arc, time::Duration};

use super::identity::caller_header;

/// How often callers with a full bucket are forgotten.
pub const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Rate limiter state shared across requests.
///
/// Keyed by the caller header, which is not authenticated, so idle keys are
/// pruned on a timer.
pub struct RateLimiterState {
    limiter: DefaultKeyedRateLimiter<String>,
    clock: DefaultClock,
}

impl RateLimiterState {
    /// Allows `requests` per `period`, refilled evenly, with bursts up to `requests`.
    pub fn new(requests: u32, period: Duration) -> Self {
        let burst = NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(period / burst.get())
            .unwrap_or_else(|| Quota::per_minute(burst))
            .allow_burst(burst);

        Self {
            limiter: RateLimiter::dashmap(quota),
            clock: DefaultClock::default(),
        }
    }

    /// Returns `None` if the request may proceed, otherwise how long the
    /// caller has to wait.
    pub fn check(&self, key: &str) -> Option<Duration> {
        match self.limiter.check_key(&key.to_string()) {
            Ok(()) => None,
            Err(not_until) => Some(not_until.wait_time_from(self.clock.now())),
        }
    }

    /// Drops callers whose bucket has refilled completely.
    pub fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Number of callers currently tracked.
    pub fn tracked_callers(&self) -> usize {
        self.limiter.len()
    }

    /// Prunes every `interval` until the returned task is aborted.
    pub fn spawn_pruning(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(state) = weak.upgrade() else {
                    break;
                };
                state.prune();
                tracing::debug!(tracked = state.tracked_callers(), "rate limiter pruned");
            }
        })
    }
}

fn is_health_path(path: &str) -> bool {
    path == "/health" || path == "/payment/health"
}

/// Rate limiting middleware keyed by the caller identity header.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiterState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if is_health_path(request.uri().path()) {
        return next.run(request).await;
    }

    let key = caller_header(request.headers())
        .unwrap_or("anonymous")
        .to_string();

    if let Some(wait) = limiter.check(&key) {
        let retry_after_seconds = wait.as_secs().max(1);
        tracing::warn!(caller = %key, retry_after_seconds, "rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "Rate limit exceeded. Please try again later.",
                "retry_after_seconds": retry_after_seconds
            })),
        )
            .into_response();
    }

    next.run(request).await
}
