//! Error types for the extraction module.

use thiserror::Error;

/// Errors from fetching one page of one entity kind.
///
/// Every variant is non-fatal to the run: the worker logs it and moves on to
/// its next scheduled offset, permanently skipping the failed page. Only the
/// auth exchange can fail a run outright.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level error (DNS, connection refused, TLS, timeout).
    #[error("network error fetching {url} at offset {offset}: {source}")]
    Network {
        /// The endpoint that failed.
        url: String,
        /// The page offset being fetched.
        offset: u64,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The API answered with a non-success status.
    #[error("HTTP {status} fetching {url} at offset {offset}: {body}")]
    HttpStatus {
        /// The endpoint that failed.
        url: String,
        /// The page offset being fetched.
        offset: u64,
        /// The HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The response body was not a decodable array of records.
    #[error("failed to decode page from {url} at offset {offset}: {source}")]
    Decode {
        /// The endpoint that failed.
        url: String,
        /// The page offset being fetched.
        offset: u64,
        /// The underlying decode error.
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Creates a network error.
    pub fn network(url: impl Into<String>, offset: u64, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            offset,
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(
        url: impl Into<String>,
        offset: u64,
        status: u16,
        body: impl Into<String>,
    ) -> Self {
        Self::HttpStatus {
            url: url.into(),
            offset,
            status,
            body: body.into(),
        }
    }

    /// Creates a decode error.
    pub fn decode(url: impl Into<String>, offset: u64, source: reqwest::Error) -> Self {
        Self::Decode {
            url: url.into(),
            offset,
            source,
        }
    }

    /// Returns the offset of the page that failed.
    #[must_use]
    pub fn offset(&self) -> u64 {
        match self {
            Self::Network { offset, .. }
            | Self::HttpStatus { offset, .. }
            | Self::Decode { offset, .. } => *offset,
        }
    }
}
