//! Single-page fetch against the catalog API.
//!
//! A [`Fetcher`] is parameterized by entity kind and otherwise stateless per
//! call: it renders one [`PageRequest`] into the API's plain-text query
//! body, attaches the credential headers, issues one POST, and decodes the
//! JSON array of records. Pagination policy lives in the worker pool, not
//! here.

use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{instrument, trace};

use super::error::FetchError;
use super::rate_limiter::RateLimiter;
use crate::auth::AuthToken;
use crate::model::Entity;

/// One page request: immutable once constructed, discarded per attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    query: String,
    offset: u64,
    limit: usize,
}

impl PageRequest {
    /// Creates a request for `limit` records starting at `offset`.
    #[must_use]
    pub fn new(query: impl Into<String>, offset: u64, limit: usize) -> Self {
        Self {
            query: query.into(),
            offset,
            limit,
        }
    }

    /// Returns the page offset.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns the page size limit.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Renders the outbound body: the field-selection query with pagination
    /// directives appended.
    #[must_use]
    pub fn body(&self) -> String {
        format!(
            "{}\nlimit {};\noffset {};",
            self.query, self.limit, self.offset
        )
    }
}

/// Fetches pages of one entity kind.
///
/// Holds the shared HTTP client, the run's credential, and a handle to the
/// run-wide [`RateLimiter`]. Cheap to construct; one instance per entity
/// kind per run.
#[derive(Debug)]
pub struct Fetcher<T: Entity> {
    http: reqwest::Client,
    endpoint: String,
    client_id: String,
    token: AuthToken,
    limiter: Arc<RateLimiter>,
    _kind: PhantomData<fn() -> T>,
}

// Cloned into each spawned worker; the underlying reqwest client is itself
// reference-counted, so clones share one connection pool.
impl<T: Entity> Clone for Fetcher<T> {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            endpoint: self.endpoint.clone(),
            client_id: self.client_id.clone(),
            token: self.token.clone(),
            limiter: Arc::clone(&self.limiter),
            _kind: PhantomData,
        }
    }
}

impl<T: Entity> Fetcher<T> {
    /// Creates a fetcher for entity kind `T` against `api_base`.
    ///
    /// The endpoint is `{api_base}/{T::KIND}`.
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        api_base: &str,
        client_id: impl Into<String>,
        token: AuthToken,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            http,
            endpoint: format!("{}/{}", api_base.trim_end_matches('/'), T::KIND),
            client_id: client_id.into(),
            token,
            limiter,
            _kind: PhantomData,
        }
    }

    /// Returns the resolved endpoint URL for this kind.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the shared rate limiter handle.
    #[must_use]
    pub(crate) fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Fetches and decodes one page of records.
    ///
    /// Issues exactly one request; the caller is responsible for having
    /// passed the rate limiter first.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on transport failure, non-success status, or
    /// an undecodable body. All are non-fatal per-page errors.
    #[instrument(level = "debug", skip(self, request), fields(kind = T::KIND, offset = request.offset()))]
    pub async fn fetch_page(&self, request: &PageRequest) -> Result<Vec<T>, FetchError> {
        let offset = request.offset();
        trace!(body = %request.body(), "sending page request");

        let response = self
            .http
            .post(&self.endpoint)
            .header("Client-ID", &self.client_id)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.token.bearer()),
            )
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(request.body())
            .send()
            .await
            .map_err(|source| FetchError::network(&self.endpoint, offset, source))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::http_status(
                &self.endpoint,
                offset,
                status.as_u16(),
                body,
            ));
        }

        response
            .json::<Vec<T>>()
            .await
            .map_err(|source| FetchError::decode(&self.endpoint, offset, source))
    }
}
