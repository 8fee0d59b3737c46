//! Run configuration: credentials from the environment, everything else
//! from defaults or CLI flags.

use thiserror::Error;

use crate::extract::{DEFAULT_MAX_PAGES, DEFAULT_PAGE_LIMIT, DEFAULT_WORKERS, FetchOptions};

/// Environment variable holding the API client ID.
pub const CLIENT_ID_VAR: &str = "CLIENT_ID";

/// Environment variable holding the API client secret.
pub const CLIENT_SECRET_VAR: &str = "CLIENT_SECRET";

/// Default catalog API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.igdb.com/v4";

/// Default token exchange endpoint.
pub const DEFAULT_AUTH_URL: &str = "https://id.twitch.tv/oauth2/token";

/// The API's documented request ceiling: 4 requests per second.
pub const DEFAULT_RATE_PER_SEC: f64 = 4.0;

/// Default burst capacity: no bursting beyond the steady rate.
pub const DEFAULT_BURST: u32 = 1;

/// Errors constructing a run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is unset or empty.
    #[error("{name} environment variable is required but not set")]
    MissingEnv {
        /// The variable name.
        name: &'static str,
    },
}

/// Everything one extraction run needs.
///
/// Credentials only ever enter through the environment; they are never
/// accepted as CLI flags and never logged.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// API client ID, sent as the `Client-ID` header.
    pub client_id: String,
    /// API client secret, used only for the token exchange.
    pub client_secret: String,
    /// Catalog API base URL (endpoints are `{api_base}/{kind}`).
    pub api_base: String,
    /// Token exchange endpoint.
    pub auth_url: String,
    /// Requests per second across all workers and kinds.
    pub rate_per_sec: f64,
    /// Rate limiter burst capacity.
    pub burst: u32,
    /// Per-kind worker pool tuning.
    pub fetch: FetchOptions,
}

impl ExtractConfig {
    /// Builds a configuration from the environment with default tuning.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnv`] if either credential variable is
    /// unset or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            client_id: require_env(CLIENT_ID_VAR)?,
            client_secret: require_env(CLIENT_SECRET_VAR)?,
            api_base: DEFAULT_API_BASE.to_string(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            rate_per_sec: DEFAULT_RATE_PER_SEC,
            burst: DEFAULT_BURST,
            fetch: FetchOptions {
                workers: DEFAULT_WORKERS,
                page_limit: DEFAULT_PAGE_LIMIT,
                max_pages: DEFAULT_MAX_PAGES,
            },
        })
    }

    /// Builds a configuration with explicit credentials, for callers that
    /// obtain them elsewhere (tests, embedding applications).
    #[must_use]
    pub fn with_credentials(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            rate_per_sec: DEFAULT_RATE_PER_SEC,
            burst: DEFAULT_BURST,
            fetch: FetchOptions::default(),
        }
    }
}

fn require_env(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::MissingEnv { name })
}
