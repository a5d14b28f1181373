//! WebSocket client for the notification relay.
//!
//! This module provides a reconnecting connection manager with a heartbeat
//! and a per-type handler table for inbound frames.
//!
//! # Example
//!
//! ```rust,ignore
//! use printrelay_sdk::ws::{ConnectionManager, WsConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = ConnectionManager::new(WsConfig::new("wss://relay.example"))?;
//!
//!     manager.on("notification", |frame| println!("push: {}", frame));
//!     manager.on("disconnect", |event| println!("dropped: {}", event["reason"]));
//!
//!     manager.connect("user-42");
//!     tokio::signal::ctrl_c().await?;
//!     manager.disconnect();
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod messages;
pub mod transport;

pub use client::{ConnectionManager, ConnectionState};
pub use config::WsConfig;
pub use error::WsError;
pub use events::{EventHandler, EventHandlers};
pub use messages::{ClientMessage, ServerMessage};
pub use transport::{
    Connector, MemoryConnector, MemoryPeer, Transport, TransportEvent, TungsteniteConnector,
};
