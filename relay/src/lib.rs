//! Print-order notification relay.
//!
//! A WebSocket server that keeps track of which users are connected, on
//! how many sockets, and which named channels those sockets joined, plus
//! the HTTP trigger the order workflow calls to push notifications.
//!
//! # Modules
//!
//! - [`registry`]: connection and channel bookkeeping
//! - [`ws`]: socket handler, inbound dispatch, idle sweep
//! - [`trigger`]: order status change to user push
//! - [`routes`]: `POST /notify`, `POST /broadcast`, `GET /health`
//! - [`identity`]: resolving the user a socket belongs to
//!
//! # Example
//!
//! ```no_run
//! use printrelay_relay::{Relay, RelayConfig, Server};
//!
//! # async fn run() -> Result<(), printrelay_relay::RelayError> {
//! let config = RelayConfig::from_env()?;
//! Server::new(Relay::new(config)).run().await
//! # }
//! ```

pub mod config;
pub mod error;
pub mod identity;
pub mod registry;
pub mod routes;
pub mod server;
pub mod state;
pub mod trigger;
pub mod ws;

pub use config::{ConfigError, RelayConfig};
pub use error::RelayError;
pub use identity::{sign_token, IdentityError, IdentityMode, IdentityVerifier};
pub use registry::{ConnectionHandle, ConnectionId, ConnectionState, Outbound, Registry};
pub use server::{router, Server};
pub use state::Relay;
pub use trigger::{compose_message, DeliveryOutcome, DeliveryTrigger, OrderStatusChange};
