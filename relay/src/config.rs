//! Relay server configuration.
//!
//! Values come from environment variables (see [`RelayConfig::from_env`])
//! with defaults suitable for local development.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Default listen host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default listen port.
pub const DEFAULT_PORT: u16 = 3001;

/// Default socket URL advertised to browser bundles.
pub const DEFAULT_PUBLIC_URL: &str = "ws://localhost:3001";

/// Default idle sweep interval in seconds.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;

/// Default per-connection outbound queue capacity.
pub const DEFAULT_OUTBOUND_BUFFER: usize = 100;

/// Configuration for the relay server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Listen host.
    pub host: String,

    /// Listen port.
    pub port: u16,

    /// Public socket URL clients are told to connect to.
    pub public_url: String,

    /// Idle sweep interval in seconds.
    pub sweep_interval_secs: u64,

    /// Per-connection outbound queue capacity.
    pub outbound_buffer: usize,

    /// HS256 secret for signed connect tokens. None trusts the `userId`
    /// query parameter.
    #[serde(skip_serializing)]
    pub jwt_secret: Option<String>,

    /// Shared key required on the trigger endpoints. None leaves them open.
    #[serde(skip_serializing)]
    pub trigger_key: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            public_url: DEFAULT_PUBLIC_URL.to_string(),
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            jwt_secret: None,
            trigger_key: None,
        }
    }
}

impl RelayConfig {
    /// Creates a new configuration listening on the given address.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Reads the configuration from the process environment.
    ///
    /// | variable | field |
    /// |---|---|
    /// | `RELAY_HOST` | `host` |
    /// | `RELAY_PORT` | `port` |
    /// | `RELAY_PUBLIC_URL` | `public_url` |
    /// | `RELAY_SWEEP_INTERVAL_SECS` | `sweep_interval_secs` |
    /// | `RELAY_OUTBOUND_BUFFER` | `outbound_buffer` |
    /// | `RELAY_JWT_SECRET` | `jwt_secret` |
    /// | `RELAY_TRIGGER_KEY` | `trigger_key` |
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed or the result is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be parsed or the result is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup("RELAY_HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("RELAY_PORT") {
            config.port = parse_var("RELAY_PORT", &port)?;
        }
        if let Some(url) = lookup("RELAY_PUBLIC_URL") {
            config.public_url = url;
        }
        if let Some(secs) = lookup("RELAY_SWEEP_INTERVAL_SECS") {
            config.sweep_interval_secs = parse_var("RELAY_SWEEP_INTERVAL_SECS", &secs)?;
        }
        if let Some(size) = lookup("RELAY_OUTBOUND_BUFFER") {
            config.outbound_buffer = parse_var("RELAY_OUTBOUND_BUFFER", &size)?;
        }
        config.jwt_secret = lookup("RELAY_JWT_SECRET").filter(|s| !s.is_empty());
        config.trigger_key = lookup("RELAY_TRIGGER_KEY").filter(|s| !s.is_empty());

        config.validate()?;
        Ok(config)
    }

    /// Sets the public socket URL.
    #[must_use]
    pub fn with_public_url(mut self, url: impl Into<String>) -> Self {
        self.public_url = url.into();
        self
    }

    /// Sets the idle sweep interval.
    #[must_use]
    pub fn with_sweep_interval(mut self, secs: u64) -> Self {
        self.sweep_interval_secs = secs;
        self
    }

    /// Sets the outbound queue capacity.
    #[must_use]
    pub fn with_outbound_buffer(mut self, size: usize) -> Self {
        self.outbound_buffer = size;
        self
    }

    /// Enables signed connect tokens.
    #[must_use]
    pub fn with_jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.jwt_secret = Some(secret.into());
        self
    }

    /// Requires a shared key on the trigger endpoints.
    #[must_use]
    pub fn with_trigger_key(mut self, key: impl Into<String>) -> Self {
        self.trigger_key = Some(key.into());
        self
    }

    /// Returns the `host:port` listen address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the idle sweep interval.
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Returns the per-connection queue capacity, at least one.
    #[must_use]
    pub fn outbound_capacity(&self) -> usize {
        self.outbound_buffer.max(1)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::EmptyHost);
        }

        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::InvalidSweepInterval);
        }

        if self.outbound_buffer == 0 {
            return Err(ConfigError::InvalidOutboundBuffer);
        }

        let public_url = Url::parse(&self.public_url)
            .map_err(|_| ConfigError::InvalidPublicUrl(self.public_url.clone()))?;
        if !matches!(public_url.scheme(), "ws" | "wss")
            || public_url.host_str().map_or(true, str::is_empty)
        {
            return Err(ConfigError::InvalidPublicUrl(self.public_url.clone()));
        }

        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: value.to_string(),
    })
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A variable could not be parsed.
    #[error("{name} has an invalid value: {value:?}")]
    InvalidValue {
        /// Variable name.
        name: &'static str,
        /// Raw value.
        value: String,
    },

    /// Empty listen host.
    #[error("host cannot be empty")]
    EmptyHost,

    /// Zero sweep interval.
    #[error("sweep_interval_secs must be > 0")]
    InvalidSweepInterval,

    /// Zero outbound buffer.
    #[error("outbound_buffer must be > 0")]
    InvalidOutboundBuffer,

    /// Public URL is not a socket URL.
    #[error("public_url must be a ws:// or wss:// URL with a host: {0}")]
    InvalidPublicUrl(String),
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_default() {
        let config = RelayConfig::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:3001");
        assert_eq!(config.sweep_interval(), Duration::from_secs(30));
        assert!(config.jwt_secret.is_none());
        tokio_test::assert_ok!(config.validate());
    }

    #[test]
    fn test_config_from_lookup() {
        let config = RelayConfig::from_lookup(lookup(&[
            ("RELAY_HOST", "127.0.0.1"),
            ("RELAY_PORT", "4000"),
            ("RELAY_PUBLIC_URL", "wss://print.example/ws"),
            ("RELAY_SWEEP_INTERVAL_SECS", "10"),
            ("RELAY_JWT_SECRET", "s3cret"),
            ("RELAY_TRIGGER_KEY", ""),
        ]))
        .expect("valid config");

        assert_eq!(config.bind_addr(), "127.0.0.1:4000");
        assert_eq!(config.public_url, "wss://print.example/ws");
        assert_eq!(config.sweep_interval_secs, 10);
        assert_eq!(config.jwt_secret.as_deref(), Some("s3cret"));
        assert!(config.trigger_key.is_none());
    }

    #[test]
    fn test_config_from_lookup_bad_port() {
        let err = RelayConfig::from_lookup(lookup(&[("RELAY_PORT", "http")]))
            .expect_err("invalid port");
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                name: "RELAY_PORT",
                value: "http".to_string()
            }
        );
    }

    #[test]
    fn test_config_builder() {
        let config = RelayConfig::new("127.0.0.1", 0)
            .with_public_url("wss://example.com")
            .with_sweep_interval(5)
            .with_outbound_buffer(8)
            .with_jwt_secret("k")
            .with_trigger_key("t");

        assert_eq!(config.port, 0);
        assert_eq!(config.sweep_interval_secs, 5);
        assert_eq!(config.outbound_buffer, 8);
        assert_eq!(config.trigger_key.as_deref(), Some("t"));
    }

    #[test]
    fn test_config_validate_rejects_zero_values() {
        assert_eq!(
            RelayConfig::default().with_sweep_interval(0).validate(),
            Err(ConfigError::InvalidSweepInterval)
        );
        assert_eq!(
            RelayConfig::default().with_outbound_buffer(0).validate(),
            Err(ConfigError::InvalidOutboundBuffer)
        );
    }

    #[test]
    fn test_outbound_capacity_is_never_zero() {
        assert_eq!(RelayConfig::default().with_outbound_buffer(0).outbound_capacity(), 1);
        assert_eq!(RelayConfig::default().with_outbound_buffer(8).outbound_capacity(), 8);
    }

    #[test]
    fn test_config_validate_public_url() {
        for url in ["https://example.com", "ws://", "ws://bad host", "example.com"] {
            let config = RelayConfig::default().with_public_url(url);
            assert_eq!(
                config.validate(),
                Err(ConfigError::InvalidPublicUrl(url.to_string())),
                "{url}"
            );
        }
        tokio_test::assert_ok!(RelayConfig::default()
            .with_public_url("wss://print.example/ws#live")
            .validate());
    }
}
