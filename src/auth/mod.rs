//! Bearer-token acquisition for the catalog API.
//!
//! One token exchange happens per run, before any page is fetched. Any
//! failure here is fatal: the orchestrator aborts the whole run rather than
//! attempting entity fetches with no credential. There is no retry and no
//! refresh — a run that outlives its token is out of scope.

use std::time::{Duration, SystemTime};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from the token exchange. All variants are fatal to the run.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Transport-level failure reaching the auth endpoint.
    #[error("auth request failed: {source}")]
    Network {
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The auth endpoint answered with a non-success status.
    #[error("auth endpoint returned HTTP {status}: {body}")]
    HttpStatus {
        /// The HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The response body was not a valid token payload.
    #[error("failed to decode auth response: {source}")]
    Decode {
        /// The underlying decode error.
        #[source]
        source: reqwest::Error,
    },
}

/// Wire shape of the token endpoint response.
#[derive(Debug, Deserialize)]
struct AuthTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    #[allow(dead_code)]
    token_type: Option<String>,
}

/// A bearer credential, owned by the run and shared read-only by every
/// worker. Never persisted.
#[derive(Debug, Clone)]
pub struct AuthToken {
    value: String,
    expires_at: Option<SystemTime>,
}

impl AuthToken {
    /// Returns the raw token value for the `Authorization: Bearer` header.
    #[must_use]
    pub fn bearer(&self) -> &str {
        &self.value
    }

    /// Returns whether the token's advertised lifetime has elapsed.
    ///
    /// Tokens with no advertised expiry never report expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| SystemTime::now() >= at)
    }

    #[cfg(test)]
    pub(crate) fn for_tests(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            expires_at: None,
        }
    }
}

/// Exchanges client credentials for a bearer token.
///
/// Performs exactly one POST to `auth_url` with the credentials passed as
/// query parameters (the auth provider's documented client-credentials
/// grant). No retry is performed.
///
/// # Errors
///
/// Returns [`AuthError`] on transport failure, non-success status, or an
/// undecodable body. The caller must treat any error as fatal to the run.
#[instrument(skip(client, client_id, client_secret))]
pub async fn acquire(
    client: &reqwest::Client,
    auth_url: &str,
    client_id: &str,
    client_secret: &str,
) -> Result<AuthToken, AuthError> {
    let response = client
        .post(auth_url)
        .query(&[
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("grant_type", "client_credentials"),
        ])
        .send()
        .await
        .map_err(|source| AuthError::Network { source })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::HttpStatus {
            status: status.as_u16(),
            body,
        });
    }

    let payload: AuthTokenResponse = response
        .json()
        .await
        .map_err(|source| AuthError::Decode { source })?;

    let expires_at = payload
        .expires_in
        .map(|secs| SystemTime::now() + Duration::from_secs(secs));

    debug!(expires_in_secs = payload.expires_in, "acquired bearer token");

    Ok(AuthToken {
        value: payload.access_token,
        expires_at,
    })
}
