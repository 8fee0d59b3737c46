//! Gamesearch Extraction Library
//!
//! This library pulls complete game catalog collections (games, genres,
//! franchises) out of an offset-paginated, rate-limited HTTP API and hands
//! them to a pluggable sink as JSON artifacts.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`auth`] - Client-credentials token exchange
//! - [`config`] - Run configuration from environment and defaults
//! - [`extract`] - Rate limiter, offset scheduler, page fetcher, worker pool
//! - [`model`] - Typed entity kinds and their field-selection queries
//! - [`runner`] - Orchestration of one full run across all kinds
//! - [`sink`] - Artifact storage seam with a local-directory implementation

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod config;
pub mod extract;
pub mod model;
pub mod runner;
pub mod sink;

// Re-export commonly used types
pub use auth::{AuthError, AuthToken};
pub use config::{ConfigError, ExtractConfig};
pub use extract::{
    DEFAULT_MAX_PAGES, DEFAULT_PAGE_LIMIT, DEFAULT_WORKERS, FetchError, FetchOptions,
    FetchOutcome, FetchStats, Fetcher, RateLimiter,
};
pub use model::{Entity, Franchise, Game, Genre};
pub use runner::{RunError, RunSummary};
pub use sink::{DirSink, Sink, SinkError};
