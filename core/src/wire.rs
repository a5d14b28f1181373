//! Socket envelope tags and delivery trigger bodies.
//!
//! Every frame in either direction is a JSON object with a `type` tag.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::notification::Notification;

/// Frame `type` tags.
pub mod kind {
    /// Server greeting after accept. Also the client-local open event.
    pub const CONNECT: &str = "connect";
    /// Client asks to join a named channel.
    pub const JOIN_CHANNEL: &str = "joinChannel";
    /// Server acknowledges a join.
    pub const CHANNEL_JOIN: &str = "channelJoin";
    /// Client asks to leave a named channel.
    pub const LEAVE_CHANNEL: &str = "leaveChannel";
    /// Server acknowledges a leave.
    pub const CHANNEL_LEAVE: &str = "channelLeave";
    /// Client keepalive.
    pub const HEARTBEAT: &str = "heartbeat";
    /// Server reply to a keepalive.
    pub const HEARTBEAT_ACK: &str = "heartbeat_ack";
    /// Client application-level ping.
    pub const PING: &str = "ping";
    /// Server reply to a ping.
    pub const PONG: &str = "pong";
    /// Notification push (server to client) or relay request (server to server).
    pub const NOTIFICATION: &str = "notification";
    /// Server-side protocol error report. Also the client-local error event.
    pub const ERROR: &str = "error";
    /// Client-local close event.
    pub const DISCONNECT: &str = "disconnect";
}

/// Current UTC time as ISO-8601 with millisecond precision.
#[must_use]
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Body of `POST /notify`, and payload of the server-to-server
/// `notification` socket frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyRequest {
    /// Target user.
    pub user_id: String,
    /// Notification to push.
    pub notification: Notification,
}

/// Body of `POST /broadcast`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastRequest {
    /// Target channel name.
    pub channel: String,
    /// Notification to push to every member.
    pub notification: Notification,
}
