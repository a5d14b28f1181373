//! Connection manager settings.

use std::time::Duration;

use url::Url;

use super::error::WsError;

/// Default relay URL.
pub const DEFAULT_WS_URL: &str = "ws://localhost:3001";

/// Seconds between `heartbeat` frames while open.
pub const DEFAULT_HEARTBEAT_SECS: u64 = 25;

/// Default delay before a reconnect attempt, in seconds.
pub const DEFAULT_RECONNECT_DELAY_SECS: u64 = 3;

/// Default number of reconnect attempts after a drop.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Settings for [`ConnectionManager`](super::ConnectionManager).
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Relay socket URL without the identity query.
    pub url: String,

    /// Heartbeat interval while open.
    pub heartbeat_interval: Duration,

    /// Fixed delay before each reconnect attempt.
    pub reconnect_delay: Duration,

    /// Reconnect attempts before giving up.
    pub max_reconnect_attempts: u32,

    /// Optional signed identity token.
    pub token: Option<String>,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_WS_URL.to_string(),
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
            reconnect_delay: Duration::from_secs(DEFAULT_RECONNECT_DELAY_SECS),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            token: None,
        }
    }
}

impl WsConfig {
    /// Default timers against `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Overrides the heartbeat period.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Sets the reconnect delay.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets how many reconnects follow a drop before giving up.
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Sets the identity token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Returns the connection URL for a user: the base URL with `userId`
    /// (and `token` when set) appended to its query. Any fragment is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::InvalidConfig`] if the base URL does not parse.
    pub fn connection_url(&self, user_id: &str) -> Result<Url, WsError> {
        let mut url = self.parse_url()?;
        url.set_fragment(None);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("userId", user_id);
            if let Some(token) = &self.token {
                query.append_pair("token", token);
            }
        }
        Ok(url)
    }

    /// Checks the URL and timer settings.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::InvalidConfig`] naming the problem.
    pub fn validate(&self) -> Result<(), WsError> {
        let url = self.parse_url()?;
        let reason = if !matches!(url.scheme(), "ws" | "wss") {
            "url must be a ws:// or wss:// URL"
        } else if url.host_str().map_or(true, str::is_empty) {
            "url has no host"
        } else if self.heartbeat_interval.is_zero() {
            "heartbeat_interval must be non-zero"
        } else {
            return Ok(());
        };
        Err(WsError::InvalidConfig(reason.to_string()))
    }

    fn parse_url(&self) -> Result<Url, WsError> {
        Url::parse(&self.url)
            .map_err(|e| WsError::InvalidConfig(format!("invalid url {:?}: {}", self.url, e)))
    }
}
