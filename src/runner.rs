//! Top-level orchestration of one extraction run.
//!
//! A run acquires the bearer token once, then drains each configured entity
//! kind through its own worker pool — all pools sharing the single
//! [`RateLimiter`] — and hands each serialized collection to the sink.
//! Kinds are independent: fetch gaps, serialization trouble, or a failed
//! upload in one kind never aborts the others. Only the token exchange can
//! fail the run as a whole.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::auth::{self, AuthError, AuthToken};
use crate::config::ExtractConfig;
use crate::extract::{Fetcher, RateLimiter};
use crate::model::{Entity, Franchise, Game, Genre};
use crate::sink::Sink;

/// Errors that fail an entire run.
#[derive(Debug, Error)]
pub enum RunError {
    /// Token acquisition failed; no fetch was attempted.
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),
}

/// Result of one entity kind's extraction and upload.
#[derive(Debug, Clone)]
pub struct KindSummary {
    /// Collection name.
    pub kind: &'static str,
    /// Records collected.
    pub records: usize,
    /// Pages permanently skipped due to fetch errors.
    pub pages_failed: usize,
    /// Whether the artifact reached the sink.
    pub uploaded: bool,
}

/// Per-kind results for one run.
#[derive(Debug, Default)]
pub struct RunSummary {
    kinds: Vec<KindSummary>,
}

impl RunSummary {
    /// Returns the per-kind summaries in processing order.
    #[must_use]
    pub fn kinds(&self) -> &[KindSummary] {
        &self.kinds
    }

    /// Returns the total records collected across kinds.
    #[must_use]
    pub fn total_records(&self) -> usize {
        self.kinds.iter().map(|k| k.records).sum()
    }

    /// Returns whether every kind's artifact reached the sink.
    #[must_use]
    pub fn fully_uploaded(&self) -> bool {
        self.kinds.iter().all(|k| k.uploaded)
    }
}

/// Runs one extraction: auth, then every entity kind, then the sink.
///
/// # Errors
///
/// Returns [`RunError::Auth`] if the token exchange fails — in that case no
/// entity endpoint is ever contacted. All later failures degrade to
/// best-effort partial output recorded in the [`RunSummary`].
#[instrument(skip_all)]
pub async fn run(
    config: &ExtractConfig,
    sink: &dyn Sink,
    cancel: &CancellationToken,
) -> Result<RunSummary, RunError> {
    let http = reqwest::Client::new();

    let token = auth::acquire(
        &http,
        &config.auth_url,
        &config.client_id,
        &config.client_secret,
    )
    .await?;

    // The one shared limiter: every worker of every kind draws from it.
    let limiter = Arc::new(RateLimiter::new(config.rate_per_sec, config.burst));

    let mut summary = RunSummary::default();
    summary
        .kinds
        .push(extract_kind::<Genre>(&http, config, &token, &limiter, sink, cancel).await);
    summary
        .kinds
        .push(extract_kind::<Game>(&http, config, &token, &limiter, sink, cancel).await);
    summary
        .kinds
        .push(extract_kind::<Franchise>(&http, config, &token, &limiter, sink, cancel).await);

    info!(
        total_records = summary.total_records(),
        fully_uploaded = summary.fully_uploaded(),
        "run complete"
    );

    Ok(summary)
}

/// Extracts one kind and pushes its artifact to the sink.
///
/// Never fails: trouble is logged and reflected in the summary.
async fn extract_kind<T: Entity>(
    http: &reqwest::Client,
    config: &ExtractConfig,
    token: &AuthToken,
    limiter: &Arc<RateLimiter>,
    sink: &dyn Sink,
    cancel: &CancellationToken,
) -> KindSummary {
    let fetcher: Fetcher<T> = Fetcher::new(
        http.clone(),
        &config.api_base,
        &config.client_id,
        token.clone(),
        Arc::clone(limiter),
    );

    let outcome = fetcher.fetch_all(&config.fetch, cancel).await;
    let artifact = format!("{}.json", T::KIND);

    let uploaded = match serde_json::to_vec_pretty(&outcome.records) {
        Ok(bytes) => match sink.upload(&artifact, &bytes).await {
            Ok(()) => true,
            Err(error) => {
                warn!(artifact, error = %error, "upload failed; collection not persisted");
                false
            }
        },
        Err(error) => {
            warn!(artifact, error = %error, "serialization failed; collection not persisted");
            false
        }
    };

    KindSummary {
        kind: T::KIND,
        records: outcome.records.len(),
        pages_failed: outcome.stats.failed(),
        uploaded,
    }
}
