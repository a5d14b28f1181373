//! Printrelay - real-time order notifications for a print-order service.
//!
//! This umbrella crate re-exports the workspace members:
//!
//! - [`core`] - Wire types shared by server and clients
//! - [`relay`] - The WebSocket relay server and its delivery trigger
//! - [`sdk`] - Client library: connection manager, notification store and
//!   REST clients

pub use printrelay_core as core;
pub use printrelay_relay as relay;
pub use printrelay_sdk as sdk;
