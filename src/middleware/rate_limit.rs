use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::time::Instant;

use crate::{config::Config, error::AppError};

const COUNT_BITS: u32 = 32;
const COUNT_MASK: u64 = (1 << COUNT_BITS) - 1;

/// Fixed-window request counter shared by every route in the process.
///
/// The window index (high half) and the count within it (low half) live in
/// one word, so rolling into a new window and counting the first request in
/// it happen in a single compare-and-swap.
pub struct RateLimiter {
    epoch: Instant,
    window_ms: u64,
    limit: u64,
    state: AtomicU64,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            epoch: Instant::now(),
            window_ms: (window.as_millis() as u64).max(1),
            limit: u64::from(limit),
            state: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.rate_limit_requests, config.rate_limit_window())
    }

    /// Counts one request; on rejection returns the seconds left in the window.
    pub fn check(&self) -> Result<(), u64> {
        self.check_at(self.epoch.elapsed().as_millis() as u64)
    }

    fn check_at(&self, now_ms: u64) -> Result<(), u64> {
        let window = now_ms / self.window_ms;
        let tag = window & COUNT_MASK;
        let mut current = self.state.load(Ordering::Acquire);

        loop {
            let count = if current >> COUNT_BITS == tag {
                current & COUNT_MASK
            } else {
                0
            };
            if count >= self.limit {
                let remaining_ms = (window + 1) * self.window_ms - now_ms;
                return Err(remaining_ms.div_ceil(1000).max(1));
            }

            let next = (tag << COUNT_BITS) | (count + 1);
            match self
                .state
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    match limiter.check() {
        Ok(()) => next.run(req).await,
        Err(retry_after) => {
            tracing::warn!("Rate limit exceeded on {}", req.uri().path());
            AppError::RateLimited(retry_after).into_response()
        }
    }
}
