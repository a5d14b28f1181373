//! Client-side notification state.
//!
//! - [`NotificationStore`] holds the list, applies pushes and read receipts
//! - [`NotificationHub`] fans pushes out to UI subscribers
//! - [`spawn_sync`] reconciles the store with the REST API periodically

pub mod api;
pub mod hub;
pub mod notifications;
pub mod sync;

pub use api::NotificationApi;
pub use hub::{NotificationHub, Subscriber, SubscriptionId};
pub use notifications::NotificationStore;
pub use sync::{spawn_sync, SyncHandle, DEFAULT_SYNC_INTERVAL, MIN_SYNC_INTERVAL};
