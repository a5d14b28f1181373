//! WebSocket module for real-time notification delivery.
//!
//! Clients connect with `?userId=<id>` (plus `&token=<jwt>` when signed
//! identities are enabled) and receive every notification addressed to
//! that user on each of their open connections.
//!
//! # Message Types
//!
//! - `joinChannel` / `leaveChannel`: channel membership requests
//! - `heartbeat` / `ping`: keep-alive, answered with `heartbeat_ack` / `pong`
//! - `notification`: server-to-server push addressed to a user
//! - `connect`, `channelJoin`, `channelLeave`, `error`: server replies

pub mod dispatch;
pub mod handler;
pub mod messages;
pub mod metrics;
pub mod session;
pub mod sweep;

pub use dispatch::{DispatchOutcome, DispatchTable, FrameHandler};
pub use handler::{ws_handler, ConnectParams};
pub use messages::{ChannelRequest, ServerMessage};
pub use metrics::{Counter, WsMetrics, WsMetricsSnapshot};
pub use session::Session;
pub use sweep::{spawn_sweep, sweep_once, SweepReport};
