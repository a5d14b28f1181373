//! Relay composition root.
//!
//! [`Relay`] owns the registry, metrics, identity verifier, and dispatch
//! table. It is built once at startup and cloned into every handler.

use std::sync::Arc;

use tracing::{debug, warn};

use printrelay_core::Notification;

use crate::config::RelayConfig;
use crate::identity::IdentityVerifier;
use crate::registry::Registry;
use crate::ws::dispatch::DispatchTable;
use crate::ws::messages::ServerMessage;
use crate::ws::metrics::WsMetrics;

/// Shared relay state.
#[derive(Debug, Clone)]
pub struct Relay {
    config: Arc<RelayConfig>,
    registry: Arc<Registry>,
    metrics: Arc<WsMetrics>,
    identity: Arc<IdentityVerifier>,
    dispatch: Arc<DispatchTable>,
}

impl Relay {
    /// Creates a relay with a fresh registry and the standard dispatch table.
    #[must_use]
    pub fn new(config: RelayConfig) -> Self {
        let identity = match &config.jwt_secret {
            Some(secret) => IdentityVerifier::signed(secret.clone()),
            None => IdentityVerifier::trusting(),
        };

        Self {
            config: Arc::new(config),
            registry: Arc::new(Registry::new()),
            metrics: Arc::new(WsMetrics::new()),
            identity: Arc::new(identity),
            dispatch: Arc::new(DispatchTable::standard()),
        }
    }

    /// Replaces the dispatch table.
    #[must_use]
    pub fn with_dispatch(mut self, dispatch: DispatchTable) -> Self {
        self.dispatch = Arc::new(dispatch);
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Returns the connection registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Returns the metrics.
    #[must_use]
    pub fn metrics(&self) -> &Arc<WsMetrics> {
        &self.metrics
    }

    /// Returns the identity verifier.
    #[must_use]
    pub fn identity(&self) -> &IdentityVerifier {
        &self.identity
    }

    /// Returns the inbound dispatch table.
    #[must_use]
    pub fn dispatch(&self) -> &DispatchTable {
        &self.dispatch
    }

    /// Pushes a notification to every live connection of a user.
    ///
    /// Returns the number of connections the frame was enqueued on. Zero is
    /// the normal outcome for an offline user and is not an error.
    pub async fn push_to_user(&self, user_id: &str, notification: &Notification) -> usize {
        let handles = self.registry.find_by_user(user_id).await;
        if handles.is_empty() {
            self.metrics.record_undelivered();
            debug!(user_id, notification_id = %notification.id, "user offline, push skipped");
            return 0;
        }

        let frame = ServerMessage::notification(notification.clone());
        let delivered = handles.iter().filter(|h| h.send(frame.clone())).count();

        if delivered == 0 {
            self.metrics.record_undelivered();
        } else {
            self.metrics.record_delivered(delivered as u64);
        }
        if delivered < handles.len() {
            warn!(
                user_id,
                notification_id = %notification.id,
                delivered,
                connections = handles.len(),
                "push not enqueued on every connection"
            );
        }

        delivered
    }

    /// Pushes a notification to every member of a channel.
    ///
    /// Returns the number of connections the frame was enqueued on.
    pub async fn broadcast(&self, channel: &str, notification: &Notification) -> usize {
        let members = self.registry.members_of(channel).await;
        let frame = ServerMessage::notification(notification.clone());

        let mut delivered = 0;
        for id in members {
            if let Some(handle) = self.registry.handle(id).await {
                if handle.send(frame.clone()) {
                    delivered += 1;
                }
            }
        }

        self.metrics.record_delivered(delivered as u64);
        debug!(channel, delivered, kind = frame.kind(), "channel broadcast");
        delivered
    }
}
