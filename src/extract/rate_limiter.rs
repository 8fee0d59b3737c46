//! Token-bucket rate limiting shared by every extraction worker.
//!
//! This module provides the [`RateLimiter`] struct which bounds the total
//! outbound request rate across *all* concurrent workers and *all* entity
//! kinds fetched in one run.
//!
//! # Overview
//!
//! The bucket holds up to `burst` tokens and refills continuously at
//! `rate_per_sec`. Each request start consumes one token; a worker with no
//! token available sleeps until the refill schedule produces one. Exactly
//! one instance exists per run, constructed by the orchestrator and passed
//! by `Arc` into every worker pool — never reached through a global.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use gamesearch_extract::extract::RateLimiter;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! // At most 4 request-starts per second, no bursting.
//! let limiter = Arc::new(RateLimiter::new(4.0, 1));
//! let cancel = CancellationToken::new();
//!
//! limiter.wait(&cancel).await.expect("not cancelled");
//! // ... issue one request
//! # }
//! ```

use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Returned when a waiter was cancelled before a token became available.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("rate limiter wait cancelled")]
pub struct RateLimitCancelled;

/// Shared token-bucket limiter for outbound request starts.
///
/// Designed to be wrapped in `Arc` and shared across spawned Tokio tasks.
/// Internal state lives behind a `tokio::sync::Mutex`; the lock is only held
/// to inspect and update the bucket, never across a sleep, so waiters do not
/// serialize behind each other's delays.
#[derive(Debug)]
pub struct RateLimiter {
    /// Tokens added per second.
    rate_per_sec: f64,
    /// Maximum tokens the bucket can hold.
    burst: u32,
    /// Current fill level and last refill time.
    bucket: Mutex<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self, now: Instant, rate_per_sec: f64, burst: u32) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * rate_per_sec).min(f64::from(burst));
        self.last_refill = now;
    }
}

impl RateLimiter {
    /// Creates a limiter refilling at `rate_per_sec` with capacity `burst`.
    ///
    /// The bucket starts full, so the first `burst` waiters proceed
    /// immediately.
    ///
    /// # Panics
    ///
    /// Panics if `rate_per_sec` is not strictly positive or `burst` is zero —
    /// both would make `wait` block forever.
    #[must_use]
    pub fn new(rate_per_sec: f64, burst: u32) -> Self {
        assert!(
            rate_per_sec > 0.0,
            "rate limiter refill rate must be positive"
        );
        assert!(burst > 0, "rate limiter burst capacity must be at least 1");
        Self {
            rate_per_sec,
            burst,
            bucket: Mutex::new(Bucket {
                tokens: f64::from(burst),
                last_refill: Instant::now(),
            }),
        }
    }

    /// Returns the configured refill rate in tokens per second.
    #[must_use]
    pub fn rate_per_sec(&self) -> f64 {
        self.rate_per_sec
    }

    /// Returns the configured burst capacity.
    #[must_use]
    pub fn burst(&self) -> u32 {
        self.burst
    }

    /// Suspends the caller until one token is available, then consumes it.
    ///
    /// Multiple waiters race for tokens as they refill; no fairness is
    /// guaranteed, only the aggregate rate bound.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitCancelled`] if `cancel` fires before a token is
    /// consumed. No token is consumed in that case.
    #[instrument(level = "trace", skip_all)]
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<(), RateLimitCancelled> {
        loop {
            if cancel.is_cancelled() {
                return Err(RateLimitCancelled);
            }

            // Inspect the bucket and compute any needed delay without
            // holding the lock across the sleep.
            let delay = {
                let mut bucket = self.bucket.lock().await;
                bucket.refill(Instant::now(), self.rate_per_sec, self.burst);
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return Ok(());
                }
                Duration::from_secs_f64((1.0 - bucket.tokens) / self.rate_per_sec)
            };

            debug!(delay_ms = delay.as_millis(), "waiting for rate limit token");

            tokio::select! {
                () = cancel.cancelled() => return Err(RateLimitCancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}
