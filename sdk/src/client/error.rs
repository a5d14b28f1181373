//! REST client errors.

use std::fmt;

/// Error returned by [`ApiClient`](super::ApiClient) and
/// [`RelayClient`](super::RelayClient).
#[derive(Debug)]
pub enum ClientError {
    /// The request never produced a response.
    Request(reqwest::Error),

    /// The response body was not the expected JSON.
    Decode(String),

    /// Non-success status other than 401, 404 and 429.
    Api {
        /// HTTP status code.
        status: u16,
        /// `error` field of the body, or the raw body.
        message: String,
    },

    /// 429 after the retry budget ran out.
    RateLimited {
        /// `Retry-After` in seconds, when the server sent one.
        retry_after: Option<u64>,
    },

    /// 404 for the given path.
    NotFound(String),

    /// 401: missing session or wrong relay key.
    Unauthorized,

    /// Rejected by [`ClientConfig::validate`](super::ClientConfig::validate).
    InvalidConfig(String),

    /// The request timed out on every attempt.
    Timeout,
}

impl ClientError {
    /// Returns the HTTP status behind the error, if there was a response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            Self::NotFound(_) => Some(404),
            Self::Unauthorized => Some(401),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            Self::Decode(_) | Self::InvalidConfig(_) | Self::Timeout => None,
        }
    }

    /// Returns true for failures worth retrying later: timeouts, rate
    /// limits, connection failures and 5xx.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::RateLimited { .. } | Self::Request(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(e) => write!(f, "request failed: {}", e),
            Self::Decode(msg) => write!(f, "unexpected response body: {}", msg),
            Self::Api { status, message } => write!(f, "server returned {}: {}", status, message),
            Self::RateLimited {
                retry_after: Some(secs),
            } => write!(f, "rate limited, retry after {}s", secs),
            Self::RateLimited { retry_after: None } => f.write_str("rate limited"),
            Self::NotFound(path) => write!(f, "{} not found", path),
            Self::Unauthorized => f.write_str("unauthorized"),
            Self::InvalidConfig(msg) => write!(f, "invalid client configuration: {}", msg),
            Self::Timeout => f.write_str("request timed out"),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Request(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Request(err)
        }
    }
}
