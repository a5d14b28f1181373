//! Inbound frame dispatch.
//!
//! Frames are decoded to a JSON value and routed by their `type` tag to a
//! handler looked up in a [`DispatchTable`]. Adding a frame type means
//! registering one more handler; the connection loop never changes.

use std::collections::HashMap;
use std::fmt;

use futures::future::{BoxFuture, FutureExt};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use printrelay_core::{kind, NotifyRequest};

use super::messages::{ChannelRequest, ServerMessage, INVALID_FORMAT};
use super::session::Session;
use crate::state::Relay;

/// Handler for one inbound frame type.
///
/// Receives the whole frame (tag included) and returns `false` when the
/// payload does not decode for that type.
pub type FrameHandler = for<'a> fn(&'a Relay, &'a Session, Value) -> BoxFuture<'a, bool>;

/// Result of dispatching one text frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A handler accepted the frame.
    Handled(&'static str),
    /// The tag is known but the payload did not decode.
    Invalid(&'static str),
    /// No `type` tag, or no handler for it.
    Unknown(Option<String>),
    /// The text was not JSON; an error frame was sent back.
    Malformed,
}

/// Tag-keyed table of frame handlers.
#[derive(Clone, Default)]
pub struct DispatchTable {
    handlers: HashMap<&'static str, FrameHandler>,
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("tags", &self.tags())
            .finish()
    }
}

impl DispatchTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the table with every built-in frame type.
    #[must_use]
    pub fn standard() -> Self {
        let mut table = Self::new();
        table.register(kind::JOIN_CHANNEL, on_join_channel);
        table.register(kind::LEAVE_CHANNEL, on_leave_channel);
        table.register(kind::HEARTBEAT, on_heartbeat);
        table.register(kind::PING, on_ping);
        table.register(kind::NOTIFICATION, on_notification);
        table
    }

    /// Registers a handler, replacing any previous one for the tag.
    pub fn register(&mut self, tag: &'static str, handler: FrameHandler) {
        self.handlers.insert(tag, handler);
    }

    /// Returns the handler for a tag.
    #[must_use]
    pub fn get(&self, tag: &str) -> Option<FrameHandler> {
        self.handlers.get(tag).copied()
    }

    /// Returns the registered tags, sorted.
    #[must_use]
    pub fn tags(&self) -> Vec<&'static str> {
        let mut tags: Vec<_> = self.handlers.keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    /// Decodes and routes one text frame.
    pub async fn dispatch(&self, relay: &Relay, session: &Session, text: &str) -> DispatchOutcome {
        let frame: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                debug!(connection_id = session.id(), error = %e, "non-JSON frame");
                relay.metrics().record_error();
                session.send(ServerMessage::error(INVALID_FORMAT));
                return DispatchOutcome::Malformed;
            }
        };

        let tag = frame.get("type").and_then(Value::as_str).map(str::to_owned);
        let Some((&tag, &handler)) = tag
            .as_deref()
            .and_then(|t| self.handlers.get_key_value(t))
        else {
            debug!(connection_id = session.id(), tag = ?tag, "ignoring frame with unknown type");
            return DispatchOutcome::Unknown(tag);
        };

        if handler(relay, session, frame).await {
            DispatchOutcome::Handled(tag)
        } else {
            warn!(connection_id = session.id(), tag, "ignoring frame with invalid payload");
            DispatchOutcome::Invalid(tag)
        }
    }
}

fn on_join_channel<'a>(relay: &'a Relay, session: &'a Session, frame: Value) -> BoxFuture<'a, bool> {
    async move {
        let Ok(request) = ChannelRequest::deserialize(&frame) else {
            return false;
        };
        if relay.registry().join(session.id(), &request.channel).await {
            relay.metrics().record_channel_join();
        }
        true
    }
    .boxed()
}

fn on_leave_channel<'a>(relay: &'a Relay, session: &'a Session, frame: Value) -> BoxFuture<'a, bool> {
    async move {
        let Ok(request) = ChannelRequest::deserialize(&frame) else {
            return false;
        };
        if relay.registry().leave(session.id(), &request.channel).await {
            relay.metrics().record_channel_leave();
        }
        true
    }
    .boxed()
}

fn on_heartbeat<'a>(_relay: &'a Relay, session: &'a Session, _frame: Value) -> BoxFuture<'a, bool> {
    async move {
        session.send(ServerMessage::heartbeat_ack());
        true
    }
    .boxed()
}

fn on_ping<'a>(_relay: &'a Relay, session: &'a Session, _frame: Value) -> BoxFuture<'a, bool> {
    async move {
        session.send(ServerMessage::pong());
        true
    }
    .boxed()
}

fn on_notification<'a>(relay: &'a Relay, session: &'a Session, frame: Value) -> BoxFuture<'a, bool> {
    async move {
        let Ok(request) = NotifyRequest::deserialize(&frame) else {
            return false;
        };
        let delivered = relay
            .push_to_user(&request.user_id, &request.notification)
            .await;
        debug!(
            from = session.id(),
            user_id = %request.user_id,
            delivered,
            "relayed notification frame"
        );
        true
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;
    use crate::config::RelayConfig;
    use crate::registry::{ConnectionHandle, Outbound};
    use crate::ws::metrics::Counter;

    async fn session(relay: &Relay, user: &str) -> (Session, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(10);
        let handle = ConnectionHandle::new(tx);
        let id = relay.registry().register(user, handle.clone()).await;
        (Session::new(id, user, handle), rx)
    }

    async fn next_frame(rx: &mut mpsc::Receiver<Outbound>) -> ServerMessage {
        match rx.recv().await {
            Some(Outbound::Frame(frame)) => frame,
            other => panic!("expected frame, got {:?}", other),
        }
    }

    #[test]
    fn test_standard_table_tags() {
        let table = DispatchTable::standard();
        assert_eq!(
            table.tags(),
            vec!["heartbeat", "joinChannel", "leaveChannel", "notification", "ping"]
        );
        assert!(table.get("subscribe").is_none());
    }

    #[tokio::test]
    async fn test_non_json_sends_error_frame() {
        let relay = Relay::new(RelayConfig::default());
        let (session, mut rx) = session(&relay, "u1").await;

        let outcome = relay.dispatch().dispatch(&relay, &session, "not json").await;
        assert_eq!(outcome, DispatchOutcome::Malformed);

        match next_frame(&mut rx).await {
            ServerMessage::Error { message, .. } => assert_eq!(message, INVALID_FORMAT),
            other => panic!("unexpected frame: {:?}", other),
        }
        assert_eq!(relay.metrics().get(Counter::Errors), 1);
    }

    #[tokio::test]
    async fn test_unknown_type_is_ignored() {
        let relay = Relay::new(RelayConfig::default());
        let (session, mut rx) = session(&relay, "u1").await;

        let outcome = relay
            .dispatch()
            .dispatch(&relay, &session, r#"{"type":"subscribe"}"#)
            .await;
        assert_eq!(outcome, DispatchOutcome::Unknown(Some("subscribe".to_string())));

        let outcome = relay.dispatch().dispatch(&relay, &session, "[1,2]").await;
        assert_eq!(outcome, DispatchOutcome::Unknown(None));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_heartbeat_and_ping_are_acknowledged() {
        let relay = Relay::new(RelayConfig::default());
        let (session, mut rx) = session(&relay, "u1").await;

        let table = relay.dispatch();
        assert_eq!(
            table.dispatch(&relay, &session, r#"{"type":"heartbeat"}"#).await,
            DispatchOutcome::Handled("heartbeat")
        );
        assert!(matches!(next_frame(&mut rx).await, ServerMessage::HeartbeatAck { .. }));

        table.dispatch(&relay, &session, r#"{"type":"ping"}"#).await;
        assert!(matches!(next_frame(&mut rx).await, ServerMessage::Pong { .. }));
    }

    #[tokio::test]
    async fn test_heartbeat_leaves_registry_untouched() {
        let relay = Relay::new(RelayConfig::default());
        let (session, mut rx) = session(&relay, "u1").await;
        let registry = relay.registry();
        let table = relay.dispatch();

        table
            .dispatch(&relay, &session, r#"{"type":"joinChannel","channel":"staff"}"#)
            .await;
        next_frame(&mut rx).await;

        let before = (
            registry.connection_count().await,
            registry.user_count().await,
            registry.channels_of(session.id()).await,
            registry.members_of("staff").await,
        );

        for _ in 0..3 {
            table.dispatch(&relay, &session, r#"{"type":"heartbeat"}"#).await;
            assert!(matches!(next_frame(&mut rx).await, ServerMessage::HeartbeatAck { .. }));
        }

        let after = (
            registry.connection_count().await,
            registry.user_count().await,
            registry.channels_of(session.id()).await,
            registry.members_of("staff").await,
        );
        assert_eq!(before, after);
        assert_eq!(after.0, 1);
        assert_eq!(after.2, vec!["staff".to_string()]);
    }

    #[tokio::test]
    async fn test_join_and_leave_channel() {
        let relay = Relay::new(RelayConfig::default());
        let (session, mut rx) = session(&relay, "admin").await;
        let table = relay.dispatch();

        table
            .dispatch(&relay, &session, r#"{"type":"joinChannel","channel":"admin"}"#)
            .await;
        assert_eq!(
            next_frame(&mut rx).await,
            ServerMessage::ChannelJoin {
                channel: "admin".to_string(),
                success: true
            }
        );
        assert_eq!(relay.registry().members_of("admin").await, vec![session.id()]);

        table
            .dispatch(&relay, &session, r#"{"type":"leaveChannel","channel":"admin"}"#)
            .await;
        assert!(matches!(next_frame(&mut rx).await, ServerMessage::ChannelLeave { .. }));
        assert!(relay.registry().members_of("admin").await.is_empty());
        assert_eq!(relay.metrics().get(Counter::ChannelJoins), 1);
        assert_eq!(relay.metrics().get(Counter::ChannelLeaves), 1);
    }

    #[tokio::test]
    async fn test_join_without_channel_is_invalid() {
        let relay = Relay::new(RelayConfig::default());
        let (session, mut rx) = session(&relay, "u1").await;

        let outcome = relay
            .dispatch()
            .dispatch(&relay, &session, r#"{"type":"joinChannel"}"#)
            .await;
        assert_eq!(outcome, DispatchOutcome::Invalid("joinChannel"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_notification_frame_is_relayed_to_target_user() {
        let relay = Relay::new(RelayConfig::default());
        let (sender, _sender_rx) = session(&relay, "backend").await;
        let (_target, mut target_rx) = session(&relay, "u1").await;

        let frame = json!({
            "type": "notification",
            "userId": "u1",
            "notification": {
                "id": "n1",
                "message": "Your order is ready",
                "orderId": "o1",
                "orderFilename": "thesis.pdf",
                "status": "ready_to_pickup",
                "createdAt": "2026-01-01T00:00:00.000Z",
                "read": false
            }
        });

        let outcome = relay
            .dispatch()
            .dispatch(&relay, &sender, &frame.to_string())
            .await;
        assert_eq!(outcome, DispatchOutcome::Handled("notification"));

        match next_frame(&mut target_rx).await {
            ServerMessage::Notification { notification, .. } => {
                assert_eq!(notification.order_filename, "thesis.pdf");
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_custom_handler_replaces_builtin() {
        fn silent<'a>(_: &'a Relay, _: &'a Session, _: Value) -> BoxFuture<'a, bool> {
            async { true }.boxed()
        }

        let mut table = DispatchTable::standard();
        table.register(kind::PING, silent);
        let relay = Relay::new(RelayConfig::default()).with_dispatch(table);
        let (session, mut rx) = session(&relay, "u1").await;

        relay
            .dispatch()
            .dispatch(&relay, &session, r#"{"type":"ping"}"#)
            .await;
        assert!(rx.try_recv().is_err());
    }
}
