//! HTTP clients.
//!
//! - [`ApiClient`]: the application's notification endpoints, used by the
//!   notification store for reconciliation and read receipts
//! - [`RelayClient`]: the relay's trigger endpoints, used by the order
//!   service to push notifications
//!
//! # Example
//!
//! ```rust,ignore
//! use printrelay_sdk::client::{ClientConfig, RelayClient};
//!
//! let relay = RelayClient::new(ClientConfig::new("http://localhost:3001").with_relay_key("k"))?;
//! if !relay.notify("user-42", &notification).await {
//!     // the client will pick it up on its next reconciliation
//! }
//! ```

pub mod config;
pub mod error;
pub mod http;

pub use config::ClientConfig;
pub use error::ClientError;
pub use http::{ApiClient, RelayClient, RELAY_KEY_HEADER};
