//! WebSocket message types.
//!
//! Outbound frames are a tagged enum serialized with a `type` field.
//! Inbound frames are routed by their `type` tag through the dispatch
//! table, and each handler decodes its own payload struct from here.

use serde::{Deserialize, Serialize};

use printrelay_core::{timestamp, Notification};

/// Message sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Greeting sent once the connection is registered.
    #[serde(rename = "connect", rename_all = "camelCase")]
    Connect {
        /// User the connection was registered under.
        user_id: String,
        /// Server time.
        timestamp: String,
    },

    /// Channel join acknowledged.
    #[serde(rename = "channelJoin")]
    ChannelJoin {
        /// Channel name.
        channel: String,
        /// Always true; failed joins are not acknowledged.
        success: bool,
    },

    /// Channel leave acknowledged.
    #[serde(rename = "channelLeave")]
    ChannelLeave {
        /// Channel name.
        channel: String,
        /// Always true.
        success: bool,
    },

    /// Reply to a client heartbeat.
    #[serde(rename = "heartbeat_ack")]
    HeartbeatAck {
        /// Server time.
        timestamp: String,
    },

    /// Reply to a client ping.
    #[serde(rename = "pong")]
    Pong {
        /// Server time.
        timestamp: String,
    },

    /// Notification push. The notification's fields sit at the top level.
    #[serde(rename = "notification")]
    Notification {
        /// Notification payload.
        #[serde(flatten)]
        notification: Notification,
        /// Server time of the push.
        timestamp: String,
    },

    /// Protocol error report.
    #[serde(rename = "error")]
    Error {
        /// Error message.
        message: String,
        /// Server time.
        timestamp: String,
    },
}

impl ServerMessage {
    /// Creates a connect greeting.
    #[must_use]
    pub fn connect(user_id: impl Into<String>) -> Self {
        Self::Connect {
            user_id: user_id.into(),
            timestamp: timestamp(),
        }
    }

    /// Creates a channel join acknowledgment.
    #[must_use]
    pub fn channel_join(channel: impl Into<String>) -> Self {
        Self::ChannelJoin {
            channel: channel.into(),
            success: true,
        }
    }

    /// Creates a channel leave acknowledgment.
    #[must_use]
    pub fn channel_leave(channel: impl Into<String>) -> Self {
        Self::ChannelLeave {
            channel: channel.into(),
            success: true,
        }
    }

    /// Creates a heartbeat acknowledgment.
    #[must_use]
    pub fn heartbeat_ack() -> Self {
        Self::HeartbeatAck {
            timestamp: timestamp(),
        }
    }

    /// Creates a pong message.
    #[must_use]
    pub fn pong() -> Self {
        Self::Pong {
            timestamp: timestamp(),
        }
    }

    /// Creates a notification push.
    #[must_use]
    pub fn notification(notification: Notification) -> Self {
        Self::Notification {
            notification,
            timestamp: timestamp(),
        }
    }

    /// Creates an error message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            timestamp: timestamp(),
        }
    }

    /// Returns the `type` tag of the message.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        use printrelay_core::kind;
        match self {
            Self::Connect { .. } => kind::CONNECT,
            Self::ChannelJoin { .. } => kind::CHANNEL_JOIN,
            Self::ChannelLeave { .. } => kind::CHANNEL_LEAVE,
            Self::HeartbeatAck { .. } => kind::HEARTBEAT_ACK,
            Self::Pong { .. } => kind::PONG,
            Self::Notification { .. } => kind::NOTIFICATION,
            Self::Error { .. } => kind::ERROR,
        }
    }
}

/// Error text sent for frames that are not JSON.
pub const INVALID_FORMAT: &str = "Invalid message format";

/// Payload of `joinChannel` and `leaveChannel`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelRequest {
    /// Channel name.
    pub channel: String,
}
