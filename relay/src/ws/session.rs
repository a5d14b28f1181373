//! Per-connection session passed to frame handlers.

use crate::registry::{ConnectionHandle, ConnectionId};
use crate::ws::messages::ServerMessage;

/// Identity and outbound handle of one socket connection.
#[derive(Debug, Clone)]
pub struct Session {
    id: ConnectionId,
    user_id: String,
    handle: ConnectionHandle,
}

impl Session {
    /// Creates a session for a registered connection.
    #[must_use]
    pub fn new(id: ConnectionId, user_id: impl Into<String>, handle: ConnectionHandle) -> Self {
        Self {
            id,
            user_id: user_id.into(),
            handle,
        }
    }

    /// Returns the connection id.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the user the connection was opened for.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Returns the outbound handle.
    #[must_use]
    pub const fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    /// Queues a frame to this connection only.
    pub fn send(&self, message: ServerMessage) -> bool {
        self.handle.send(message)
    }
}
