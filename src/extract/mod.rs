//! Concurrent paginated extraction engine.
//!
//! Pulls unbounded-size collections from an offset-paginated, rate-limited
//! API using a pool of workers per entity kind that share one run-wide
//! token-bucket limiter.
//!
//! # Architecture
//!
//! - [`RateLimiter`] — token bucket bounding total request rate across all
//!   workers of all kinds in a run.
//! - [`OffsetScheduler`] — self-replenishing queue of page offsets, one
//!   stripe per worker, closed by a live-stripe counter.
//! - [`Fetcher`] — one POST per page, decoded into typed records.
//! - [`fetch_all`](Fetcher::fetch_all) — the worker pool draining the
//!   scheduler into an aggregated result.
//!
//! Per-page failures are logged and skipped; only auth failure aborts a run.

mod error;
mod fetcher;
mod pool;
pub mod rate_limiter;
mod scheduler;

pub use error::FetchError;
pub use fetcher::{Fetcher, PageRequest};
pub use pool::{
    DEFAULT_MAX_PAGES, DEFAULT_PAGE_LIMIT, DEFAULT_WORKERS, FetchOptions, FetchOutcome, FetchStats,
};
pub use rate_limiter::{RateLimitCancelled, RateLimiter};
pub use scheduler::OffsetScheduler;
