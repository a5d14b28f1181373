//! Notification types.
//!
//! The authoritative notification record lives in the application's
//! database; this is the transient copy pushed over the socket and returned
//! by the REST listing. Its `id` is the persisted record's id so clients can
//! de-duplicate pushes against fetched history.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Print-order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Uploaded, waiting for staff review.
    Pending,
    /// Accepted by staff and queued for printing.
    Approved,
    /// Currently on the printer.
    Printing,
    /// Printed and waiting at the counter.
    ReadyToPickup,
    /// Picked up and paid.
    Completed,
    /// Refused by staff, usually with a reason.
    Rejected,
    /// Withdrawn by the customer.
    Cancelled,
}

impl OrderStatus {
    /// Returns the wire value of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Printing => "printing",
            Self::ReadyToPickup => "ready_to_pickup",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns the phrase used in customer-facing notification text.
    #[must_use]
    pub const fn phrase(&self) -> &'static str {
        match self {
            Self::Pending => "pending review",
            Self::Approved => "approved",
            Self::Printing => "being printed",
            Self::ReadyToPickup => "ready to pick up",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses a wire value. Returns None for statuses this build does not know.
    #[must_use]
    pub fn parse(status: &str) -> Option<Self> {
        match status {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "printing" => Some(Self::Printing),
            "ready_to_pickup" => Some(Self::ReadyToPickup),
            "completed" => Some(Self::Completed),
            "rejected" => Some(Self::Rejected),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire form of an order notification.
///
/// `status` is kept as a string so statuses added on the server side still
/// parse on older clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Persisted notification id.
    pub id: String,
    /// Human-readable text.
    pub message: String,
    /// Order the notification is about.
    pub order_id: String,
    /// Original filename of the uploaded document.
    pub order_filename: String,
    /// Order status at the time the notification was created.
    pub status: String,
    /// Reason given by staff when rejecting an order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    /// Amount due, when the status carries a price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    /// Creation time (ISO-8601).
    pub created_at: String,
    /// Whether the customer has acknowledged the notification.
    #[serde(default)]
    pub read: bool,
}

impl Notification {
    /// Creates an unread notification stamped with the current time.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        message: impl Into<String>,
        order_id: impl Into<String>,
        order_filename: impl Into<String>,
        status: OrderStatus,
    ) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
            order_id: order_id.into(),
            order_filename: order_filename.into(),
            status: status.as_str().to_string(),
            rejection_reason: None,
            amount: None,
            created_at: crate::wire::timestamp(),
            read: false,
        }
    }

    /// Sets the rejection reason.
    #[must_use]
    pub fn with_rejection_reason(mut self, reason: impl Into<String>) -> Self {
        self.rejection_reason = Some(reason.into());
        self
    }

    /// Sets the amount.
    #[must_use]
    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Sets the creation timestamp.
    #[must_use]
    pub fn with_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = created_at.into();
        self
    }

    /// Checks the shape of an untrusted JSON payload.
    ///
    /// Required string fields must be present and strings, `read` must be a
    /// boolean when present, and the optional fields must have the right type
    /// when present. Extra fields (such as a frame's `type` and `timestamp`)
    /// are ignored.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        Self::deserialize(value).ok()
    }

    /// Returns the parsed status, if this build knows it.
    #[must_use]
    pub fn order_status(&self) -> Option<OrderStatus> {
        OrderStatus::parse(&self.status)
    }
}
