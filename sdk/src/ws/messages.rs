//! WebSocket message types.
//!
//! Defines the frames exchanged with the relay.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use printrelay_core::Notification;

/// Client-to-server messages.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Join a named channel.
    #[serde(rename = "joinChannel")]
    JoinChannel {
        /// Channel name.
        channel: String,
    },
    /// Leave a named channel.
    #[serde(rename = "leaveChannel")]
    LeaveChannel {
        /// Channel name.
        channel: String,
    },
    /// Keep-alive, answered with `heartbeat_ack`.
    #[serde(rename = "heartbeat")]
    Heartbeat,
    /// Application ping, answered with `pong`.
    #[serde(rename = "ping")]
    Ping,
    /// Server-to-server push addressed to a user.
    #[serde(rename = "notification", rename_all = "camelCase")]
    Notify {
        /// Target user.
        user_id: String,
        /// Notification to push.
        notification: Notification,
    },
}

impl ClientMessage {
    /// Creates a join request.
    #[must_use]
    pub fn join(channel: impl Into<String>) -> Self {
        Self::JoinChannel {
            channel: channel.into(),
        }
    }

    /// Creates a leave request.
    #[must_use]
    pub fn leave(channel: impl Into<String>) -> Self {
        Self::LeaveChannel {
            channel: channel.into(),
        }
    }
}

/// Server-to-client messages.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Greeting after registration.
    #[serde(rename = "connect", rename_all = "camelCase")]
    Connect {
        /// Registered user id.
        user_id: String,
        /// Server time.
        timestamp: String,
    },
    /// Channel join acknowledged.
    #[serde(rename = "channelJoin")]
    ChannelJoin {
        /// Channel name.
        channel: String,
        /// Join result.
        success: bool,
    },
    /// Channel leave acknowledged.
    #[serde(rename = "channelLeave")]
    ChannelLeave {
        /// Channel name.
        channel: String,
        /// Leave result.
        success: bool,
    },
    /// Heartbeat reply.
    #[serde(rename = "heartbeat_ack")]
    HeartbeatAck {
        /// Server time.
        timestamp: String,
    },
    /// Ping reply.
    #[serde(rename = "pong")]
    Pong {
        /// Server time.
        timestamp: String,
    },
    /// Notification push. Fields are kept raw so the shape can be checked
    /// separately.
    #[serde(rename = "notification")]
    Notification {
        /// Every field other than `type`.
        #[serde(flatten)]
        fields: Map<String, Value>,
    },
    /// Error report.
    #[serde(rename = "error")]
    Error {
        /// Error message.
        message: String,
    },
}

impl ServerMessage {
    /// Decodes a frame value.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        Self::deserialize(value).ok()
    }

    /// Returns the notification carried by a push, if its shape is valid.
    #[must_use]
    pub fn notification(&self) -> Option<Notification> {
        match self {
            Self::Notification { fields } => {
                Notification::from_value(&Value::Object(fields.clone()))
            }
            _ => None,
        }
    }
}
