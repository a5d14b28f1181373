//! Socket client errors.

use std::fmt;

use tokio_tungstenite::tungstenite;

/// Errors surfaced by the socket client.
///
/// Failures after the socket opened are not errors here; they arrive as
/// `error` and `disconnect` events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsError {
    /// The socket could not be opened.
    Connection(String),

    /// The relay answered the upgrade request with a non-101 status,
    /// typically 401 for a rejected identity.
    Rejected(u16),

    /// The configuration cannot produce a usable connection URL.
    InvalidConfig(String),
}

impl WsError {
    /// Returns true if retrying with the same configuration cannot succeed.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Rejected(401 | 403) | Self::InvalidConfig(_))
    }
}

impl fmt::Display for WsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(msg) => write!(f, "connection failed: {}", msg),
            Self::Rejected(status) => write!(f, "upgrade rejected with status {}", status),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for WsError {}

impl From<tungstenite::Error> for WsError {
    fn from(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::Http(response) => Self::Rejected(response.status().as_u16()),
            other => Self::Connection(other.to_string()),
        }
    }
}
