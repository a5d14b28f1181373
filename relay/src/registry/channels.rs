//! Named channel membership.
//!
//! Channels are created lazily on first join and dropped when their last
//! member leaves or disconnects.

use tracing::debug;

use super::{ConnectionId, Registry};
use crate::ws::messages::ServerMessage;

impl Registry {
    /// Adds a connection to a channel and acknowledges it to that connection.
    ///
    /// Joining a channel twice is idempotent; the acknowledgment is sent
    /// again. Returns false if the connection is unknown.
    pub async fn join(&self, id: ConnectionId, channel: &str) -> bool {
        let mut state = self.state.write().await;

        let Some(entry) = state.connections.get_mut(&id) else {
            return false;
        };
        entry.channels.insert(channel.to_string());
        let handle = entry.handle.clone();

        state
            .channels
            .entry(channel.to_string())
            .or_default()
            .insert(id);
        drop(state);

        if !handle.send(ServerMessage::channel_join(channel)) {
            debug!(connection_id = id, channel, "join ack not enqueued");
        }
        true
    }

    /// Removes a connection from a channel and acknowledges it.
    ///
    /// Leaving a channel the connection is not in still acknowledges.
    /// Returns false if the connection is unknown.
    pub async fn leave(&self, id: ConnectionId, channel: &str) -> bool {
        let mut state = self.state.write().await;

        let Some(entry) = state.connections.get_mut(&id) else {
            return false;
        };
        entry.channels.remove(channel);
        let handle = entry.handle.clone();

        if let Some(members) = state.channels.get_mut(channel) {
            members.remove(&id);
            if members.is_empty() {
                state.channels.remove(channel);
            }
        }
        drop(state);

        if !handle.send(ServerMessage::channel_leave(channel)) {
            debug!(connection_id = id, channel, "leave ack not enqueued");
        }
        true
    }

    /// Returns the connection ids in a channel.
    pub async fn members_of(&self, channel: &str) -> Vec<ConnectionId> {
        let state = self.state.read().await;
        state
            .channels
            .get(channel)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Returns the channels a connection has joined.
    pub async fn channels_of(&self, id: ConnectionId) -> Vec<String> {
        let state = self.state.read().await;
        state
            .connections
            .get(&id)
            .map(|entry| entry.channels.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the number of non-empty channels.
    pub async fn channel_count(&self) -> usize {
        self.state.read().await.channels.len()
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::registry::{ConnectionHandle, Outbound};

    async fn connect(registry: &Registry, user: &str) -> (ConnectionId, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(10);
        let id = registry.register(user, ConnectionHandle::new(tx)).await;
        (id, rx)
    }

    #[tokio::test]
    async fn test_join_adds_member_and_acks() {
        let registry = Registry::new();
        let (id, mut rx) = connect(&registry, "u1").await;

        assert!(registry.join(id, "admin").await);

        assert_eq!(registry.members_of("admin").await, vec![id]);
        assert_eq!(registry.channels_of(id).await, vec!["admin".to_string()]);
        assert_eq!(
            rx.recv().await,
            Some(Outbound::Frame(ServerMessage::channel_join("admin")))
        );
    }

    #[tokio::test]
    async fn test_join_is_idempotent() {
        let registry = Registry::new();
        let (id, _rx) = connect(&registry, "u1").await;

        registry.join(id, "admin").await;
        registry.join(id, "admin").await;

        assert_eq!(registry.members_of("admin").await.len(), 1);
        assert_eq!(registry.channel_count().await, 1);
    }

    #[tokio::test]
    async fn test_ack_goes_only_to_joining_connection() {
        let registry = Registry::new();
        let (id1, _rx1) = connect(&registry, "u1").await;
        let (id2, mut rx2) = connect(&registry, "u2").await;

        registry.join(id2, "admin").await;
        let _ = rx2.recv().await;
        registry.join(id1, "admin").await;

        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_join_unknown_connection() {
        let registry = Registry::new();
        assert!(!registry.join(42, "admin").await);
        assert!(registry.members_of("admin").await.is_empty());
    }

    #[tokio::test]
    async fn test_join_then_leave() {
        let registry = Registry::new();
        let (id, mut rx) = connect(&registry, "u1").await;

        registry.join(id, "admin").await;
        assert!(registry.leave(id, "admin").await);

        assert!(!registry.members_of("admin").await.contains(&id));
        assert_eq!(registry.channel_count().await, 0);

        let _join_ack = rx.recv().await;
        assert_eq!(
            rx.recv().await,
            Some(Outbound::Frame(ServerMessage::channel_leave("admin")))
        );
    }

    #[tokio::test]
    async fn test_leave_keeps_other_members() {
        let registry = Registry::new();
        let (id1, _rx1) = connect(&registry, "u1").await;
        let (id2, _rx2) = connect(&registry, "u2").await;

        registry.join(id1, "admin").await;
        registry.join(id2, "admin").await;
        registry.leave(id1, "admin").await;

        assert_eq!(registry.members_of("admin").await, vec![id2]);
    }

    #[tokio::test]
    async fn test_unregister_removes_all_memberships() {
        let registry = Registry::new();
        let (id, _rx) = connect(&registry, "u1").await;
        let (other, _rx2) = connect(&registry, "u2").await;

        registry.join(id, "admin").await;
        registry.join(id, "orders").await;
        registry.join(other, "orders").await;
        registry.unregister(id).await;

        assert!(!registry.members_of("admin").await.contains(&id));
        assert!(!registry.members_of("orders").await.contains(&id));
        assert_eq!(registry.members_of("orders").await, vec![other]);
        assert_eq!(registry.channel_count().await, 1);
    }
}
