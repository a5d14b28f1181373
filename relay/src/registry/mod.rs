//! In-memory registry of live socket connections.
//!
//! Tracks which transport handles belong to which user and which
//! connections are members of which named channels. One [`Registry`] is
//! created by the server's composition root and shared by `Arc` with every
//! connection task, the idle sweep, and the delivery trigger.
//!
//! Connection and channel state sit behind a single lock so tearing a
//! connection down removes its channel memberships in the same critical
//! section; no channel ever lists a connection id the registry no longer
//! knows.

pub mod channels;
pub mod connections;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::AtomicU64;

use tokio::sync::RwLock;

pub use connections::{ConnectionHandle, ConnectionState, Outbound};

/// Opaque connection identifier, unique within one registry.
pub type ConnectionId = u64;

/// Registry of live connections and channel memberships.
#[derive(Debug)]
pub struct Registry {
    /// Next connection id to hand out.
    next_id: AtomicU64,

    /// Connection, user, and channel maps.
    state: RwLock<RegistryState>,
}

#[derive(Debug, Default)]
struct RegistryState {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    /// user id -> connection ids
    users: HashMap<String, HashSet<ConnectionId>>,
    /// channel name -> connection ids
    channels: HashMap<String, HashSet<ConnectionId>>,
}

#[derive(Debug)]
struct ConnectionEntry {
    user_id: String,
    handle: ConnectionHandle,
    channels: HashSet<String>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            state: RwLock::new(RegistryState::default()),
        }
    }
}
