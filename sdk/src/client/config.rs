//! Settings shared by the REST clients.

use std::time::Duration;

use super::error::ClientError;

/// Where the application serves `/api/notifications` in development.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Retries for timed out or rate limited requests.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// REST client settings.
///
/// The same type configures [`ApiClient`](super::ApiClient) (base URL of the
/// application, session token) and [`RelayClient`](super::RelayClient)
/// (base URL of the relay, trigger key).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Scheme, host and optional path prefix; request paths are appended.
    pub base_url: String,

    /// Per-attempt timeout.
    pub timeout: Duration,

    /// Maximum number of retries for timed out or rate limited requests.
    pub max_retries: u32,

    /// Optional bearer token for the session.
    pub auth_token: Option<String>,

    /// Optional key sent as `X-Relay-Key` to the relay trigger endpoints.
    pub relay_key: Option<String>,

    /// `User-Agent` header.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            auth_token: None,
            relay_key: None,
            user_agent: format!("printrelay-sdk/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Default settings against `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Overrides the per-attempt timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the retry budget; 0 disables retries.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the bearer token.
    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Sets the relay trigger key.
    #[must_use]
    pub fn with_relay_key(mut self, key: impl Into<String>) -> Self {
        self.relay_key = Some(key.into());
        self
    }

    /// Overrides the `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Joins the base URL and a path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Checks that the base URL is an absolute http(s) URL.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidConfig`] naming the problem.
    pub fn validate(&self) -> Result<(), ClientError> {
        let reason = if self.base_url.is_empty() {
            "base_url is empty"
        } else if !["http://", "https://"]
            .iter()
            .any(|scheme| self.base_url.starts_with(scheme))
        {
            "base_url must be an http:// or https:// URL"
        } else {
            return Ok(());
        };
        Err(ClientError::InvalidConfig(reason.to_string()))
    }
}
