//! Connection handles and the user-indexed side of the registry.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use super::{ConnectionEntry, ConnectionId, Registry};
use crate::ws::messages::ServerMessage;

/// Item queued for a connection's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// JSON frame.
    Frame(ServerMessage),
    /// Transport-level ping used by the idle sweep.
    Ping,
    /// Close the socket.
    Close,
}

/// Server-side connection lifecycle.
///
/// There is no transition back from `Open` to `Connecting`; retrying is a
/// client concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted, greeting not yet queued.
    Connecting,
    /// Greeting queued; frames flow both ways.
    Open,
    /// Socket closed or evicted.
    Closed,
}

impl ConnectionState {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Connecting => 0,
            Self::Open => 1,
            Self::Closed => 2,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Open,
            _ => Self::Closed,
        }
    }
}

/// Cloneable handle to a live connection's outbound queue.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    sender: mpsc::Sender<Outbound>,
    alive: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
}

impl ConnectionHandle {
    /// Wraps the sending half of a connection's outbound queue.
    #[must_use]
    pub fn new(sender: mpsc::Sender<Outbound>) -> Self {
        Self {
            sender,
            alive: Arc::new(AtomicBool::new(true)),
            state: Arc::new(AtomicU8::new(ConnectionState::Connecting.as_u8())),
        }
    }

    /// Enqueues a frame.
    ///
    /// Returns false when the queue is full or the writer is gone. Never
    /// waits: delivery means a successful enqueue, not confirmed receipt.
    pub fn send(&self, message: ServerMessage) -> bool {
        self.sender.try_send(Outbound::Frame(message)).is_ok()
    }

    /// Enqueues a transport-level ping.
    pub fn ping(&self) -> bool {
        self.sender.try_send(Outbound::Ping).is_ok()
    }

    /// Asks the writer to close the socket.
    pub fn close(&self) -> bool {
        self.sender.try_send(Outbound::Close).is_ok()
    }

    /// Returns true if the writer side has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Records activity from the peer.
    pub fn mark_alive(&self) {
        self.alive.store(true, Ordering::Release);
    }

    /// Returns whether the peer was active since the last call, clearing the flag.
    pub fn take_alive(&self) -> bool {
        self.alive.swap(false, Ordering::AcqRel)
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Moves the connection to a new lifecycle state.
    pub fn set_state(&self, state: ConnectionState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }
}

impl Registry {
    /// Registers a live connection for a user and returns its fresh id.
    ///
    /// Several connections may share a user id (multiple tabs or devices).
    pub async fn register(&self, user_id: &str, handle: ConnectionHandle) -> ConnectionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.write().await;

        state
            .users
            .entry(user_id.to_string())
            .or_default()
            .insert(id);
        state.connections.insert(
            id,
            ConnectionEntry {
                user_id: user_id.to_string(),
                handle,
                channels: HashSet::new(),
            },
        );

        debug!(connection_id = id, user_id, "connection registered");
        id
    }

    /// Removes a connection and all of its channel memberships.
    ///
    /// Idempotent: returns false if the id was already gone.
    pub async fn unregister(&self, id: ConnectionId) -> bool {
        let mut state = self.state.write().await;

        let Some(entry) = state.connections.get(&id) else {
            return false;
        };
        let joined: Vec<String> = entry.channels.iter().cloned().collect();
        let user_id = entry.user_id.clone();

        for channel in &joined {
            if let Some(members) = state.channels.get_mut(channel) {
                members.remove(&id);
                if members.is_empty() {
                    state.channels.remove(channel);
                }
            }
        }

        if let Some(ids) = state.users.get_mut(&user_id) {
            ids.remove(&id);
            if ids.is_empty() {
                state.users.remove(&user_id);
            }
        }

        state.connections.remove(&id);

        debug!(
            connection_id = id,
            user_id = %user_id,
            channels = joined.len(),
            "connection unregistered"
        );
        true
    }

    /// Returns the handles of every live connection for a user.
    ///
    /// An empty result is the ordinary "user offline" case.
    pub async fn find_by_user(&self, user_id: &str) -> Vec<ConnectionHandle> {
        let state = self.state.read().await;
        state
            .users
            .get(user_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.connections.get(id))
                    .map(|entry| entry.handle.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the handle of a connection.
    pub async fn handle(&self, id: ConnectionId) -> Option<ConnectionHandle> {
        let state = self.state.read().await;
        state.connections.get(&id).map(|entry| entry.handle.clone())
    }

    /// Returns the user a connection belongs to.
    pub async fn user_of(&self, id: ConnectionId) -> Option<String> {
        let state = self.state.read().await;
        state.connections.get(&id).map(|entry| entry.user_id.clone())
    }

    /// Returns every registered connection with its handle.
    pub async fn connections(&self) -> Vec<(ConnectionId, ConnectionHandle)> {
        let state = self.state.read().await;
        state
            .connections
            .iter()
            .map(|(id, entry)| (*id, entry.handle.clone()))
            .collect()
    }

    /// Returns the ids of every registered connection.
    pub async fn connection_ids(&self) -> Vec<ConnectionId> {
        self.state.read().await.connections.keys().copied().collect()
    }

    /// Returns the number of registered connections.
    pub async fn connection_count(&self) -> usize {
        self.state.read().await.connections.len()
    }

    /// Returns the number of distinct users with at least one connection.
    pub async fn user_count(&self) -> usize {
        self.state.read().await.users.len()
    }
}
