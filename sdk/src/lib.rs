//! Printrelay SDK - client library for the print-order notification relay.
//!
//! # Modules
//!
//! - [`ws`] - Socket connection manager with reconnect and heartbeat
//! - [`store`] - Notification list with optimistic read receipts
//! - [`client`] - REST clients for the notification API and the relay's
//!   delivery trigger
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use printrelay_sdk::{
//!     spawn_sync, ApiClient, ClientConfig, ConnectionManager, NotificationApi,
//!     NotificationHub, NotificationStore, WsConfig, DEFAULT_SYNC_INTERVAL,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let api = ApiClient::new(ClientConfig::new("http://localhost:3000"))?;
//! let store = Arc::new(NotificationStore::new(Arc::new(api) as Arc<dyn NotificationApi>));
//! let hub = Arc::new(NotificationHub::new());
//! hub.subscribe(|n| println!("{}", n.message));
//!
//! let manager = ConnectionManager::new(WsConfig::new("ws://localhost:3001"))?;
//! store.attach(&manager, hub);
//! manager.connect("user-42");
//!
//! let _sync = spawn_sync(store, DEFAULT_SYNC_INTERVAL);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod store;
pub mod ws;

pub use client::{ApiClient, ClientConfig, ClientError, RelayClient};
pub use printrelay_core::{kind, Notification, OrderStatus};
pub use store::{
    spawn_sync, NotificationApi, NotificationHub, NotificationStore, SyncHandle,
    DEFAULT_SYNC_INTERVAL, MIN_SYNC_INTERVAL,
};
pub use ws::{ConnectionManager, ConnectionState, WsConfig, WsError};
