//! Printrelay core - wire types shared by the relay server and its clients.
//!
//! # Types
//!
//! - [`Notification`] - Wire form of a persisted order notification
//! - [`OrderStatus`] - Known print-order statuses
//! - [`NotifyRequest`], [`BroadcastRequest`] - Delivery trigger bodies
//! - [`kind`] - The `type` tags of every socket frame
//!
//! # Example
//!
//! ```rust
//! use printrelay_core::{Notification, OrderStatus};
//!
//! let n = Notification::new("n1", "Ready", "o1", "thesis.pdf", OrderStatus::ReadyToPickup);
//! assert!(!n.read);
//! ```

pub mod notification;
pub mod wire;

pub use notification::{Notification, OrderStatus};
pub use wire::{kind, timestamp, BroadcastRequest, NotifyRequest};
