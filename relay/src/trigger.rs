//! Delivery trigger.
//!
//! Turns an order status change into a user-targeted push. Delivery is best
//! effort: an offline user is the normal case, and the persisted
//! notification remains the record the client reconciles against.

use tracing::{debug, info};

use printrelay_core::{Notification, OrderStatus};

use crate::state::Relay;

/// Result of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The frame was enqueued on this many connections.
    Delivered {
        /// Connection count.
        connections: usize,
    },
    /// The user had no live connection.
    Offline,
}

impl DeliveryOutcome {
    /// Returns the number of connections reached.
    #[must_use]
    pub const fn connections(&self) -> usize {
        match self {
            Self::Delivered { connections } => *connections,
            Self::Offline => 0,
        }
    }
}

/// Order status change raised by the order workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderStatusChange {
    /// Id of the already persisted notification record.
    pub notification_id: String,
    /// Order owner.
    pub user_id: String,
    /// Order id.
    pub order_id: String,
    /// Uploaded document name.
    pub order_filename: String,
    /// New status.
    pub status: OrderStatus,
    /// Staff note for rejections.
    pub rejection_reason: Option<String>,
    /// Amount due, if priced.
    pub amount: Option<f64>,
    /// Creation time of the persisted record; defaults to now.
    pub created_at: Option<String>,
}

/// Builds the customer-facing text for a status change.
#[must_use]
pub fn compose_message(filename: &str, status: OrderStatus, rejection_reason: Option<&str>) -> String {
    let mut message = format!("Your order \"{}\" is now {}", filename, status.phrase());
    if status == OrderStatus::Rejected {
        if let Some(reason) = rejection_reason.filter(|r| !r.trim().is_empty()) {
            message.push_str(": ");
            message.push_str(reason.trim());
        }
    }
    message
}

/// Pushes notifications through a [`Relay`].
#[derive(Debug, Clone)]
pub struct DeliveryTrigger {
    relay: Relay,
}

impl DeliveryTrigger {
    /// Creates a trigger over a relay.
    #[must_use]
    pub const fn new(relay: Relay) -> Self {
        Self { relay }
    }

    /// Pushes a notification to every connection of a user.
    pub async fn deliver(&self, user_id: &str, notification: &Notification) -> DeliveryOutcome {
        match self.relay.push_to_user(user_id, notification).await {
            0 => {
                debug!(user_id, notification_id = %notification.id, "user offline, relying on reconciliation");
                DeliveryOutcome::Offline
            }
            connections => {
                info!(user_id, notification_id = %notification.id, connections, "notification delivered");
                DeliveryOutcome::Delivered { connections }
            }
        }
    }

    /// Builds the notification for a status change and delivers it.
    pub async fn order_status_changed(&self, change: OrderStatusChange) -> DeliveryOutcome {
        let message = compose_message(
            &change.order_filename,
            change.status,
            change.rejection_reason.as_deref(),
        );

        let mut notification = Notification::new(
            change.notification_id,
            message,
            change.order_id,
            change.order_filename,
            change.status,
        );
        if let Some(reason) = change.rejection_reason {
            notification = notification.with_rejection_reason(reason);
        }
        if let Some(amount) = change.amount {
            notification = notification.with_amount(amount);
        }
        if let Some(created_at) = change.created_at {
            notification = notification.with_created_at(created_at);
        }

        self.deliver(&change.user_id, &notification).await
    }
}
