//! Relay counters.
//!
//! One `AtomicU64` per [`Counter`]; the `/health` route serializes a
//! [`WsMetricsSnapshot`] of all of them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Things the relay counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    /// Sockets registered.
    ConnectionsOpened,
    /// Sockets unregistered, for any reason.
    ConnectionsClosed,
    /// Text and binary frames read from clients.
    MessagesReceived,
    /// Text frames written to clients.
    MessagesSent,
    /// Transport errors, malformed frames and rejected handshakes.
    Errors,
    /// Successful channel joins.
    ChannelJoins,
    /// Successful channel leaves.
    ChannelLeaves,
    /// Notification frames enqueued on a live connection.
    NotificationsDelivered,
    /// Notification requests for users with no live connection.
    NotificationsUndelivered,
    /// Connections removed by the idle sweep.
    Evictions,
}

impl Counter {
    const COUNT: usize = 10;
}

/// Lock-free relay counters.
#[derive(Debug)]
pub struct WsMetrics {
    counters: [AtomicU64; Counter::COUNT],
    started: Instant,
}

impl Default for WsMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl WsMetrics {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            counters: std::array::from_fn(|_| AtomicU64::new(0)),
            started: Instant::now(),
        }
    }

    #[allow(clippy::indexing_slicing)] // every discriminant is below COUNT
    fn slot(&self, counter: Counter) -> &AtomicU64 {
        &self.counters[counter as usize]
    }

    /// Adds `n` to a counter.
    pub fn add(&self, counter: Counter, n: u64) {
        self.slot(counter).fetch_add(n, Ordering::Relaxed);
    }

    /// Reads a counter.
    #[must_use]
    pub fn get(&self, counter: Counter) -> u64 {
        self.slot(counter).load(Ordering::Relaxed)
    }

    /// Opened minus closed.
    #[must_use]
    pub fn active_connections(&self) -> u64 {
        self.get(Counter::ConnectionsOpened)
            .saturating_sub(self.get(Counter::ConnectionsClosed))
    }

    /// Time since the counters were created.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Reads every counter.
    #[must_use]
    pub fn snapshot(&self) -> WsMetricsSnapshot {
        WsMetricsSnapshot {
            connections_opened: self.get(Counter::ConnectionsOpened),
            connections_closed: self.get(Counter::ConnectionsClosed),
            active_connections: self.active_connections(),
            messages_received: self.get(Counter::MessagesReceived),
            messages_sent: self.get(Counter::MessagesSent),
            errors: self.get(Counter::Errors),
            channel_joins: self.get(Counter::ChannelJoins),
            channel_leaves: self.get(Counter::ChannelLeaves),
            notifications_delivered: self.get(Counter::NotificationsDelivered),
            notifications_undelivered: self.get(Counter::NotificationsUndelivered),
            evictions: self.get(Counter::Evictions),
            uptime_secs: self.uptime().as_secs(),
        }
    }
}

/// Shorthands for [`WsMetrics::add`].
#[allow(missing_docs)]
impl WsMetrics {
    pub fn record_connection_opened(&self) {
        self.add(Counter::ConnectionsOpened, 1);
    }

    pub fn record_connection_closed(&self) {
        self.add(Counter::ConnectionsClosed, 1);
    }

    pub fn record_message_received(&self) {
        self.add(Counter::MessagesReceived, 1);
    }

    pub fn record_message_sent(&self) {
        self.add(Counter::MessagesSent, 1);
    }

    pub fn record_error(&self) {
        self.add(Counter::Errors, 1);
    }

    pub fn record_channel_join(&self) {
        self.add(Counter::ChannelJoins, 1);
    }

    pub fn record_channel_leave(&self) {
        self.add(Counter::ChannelLeaves, 1);
    }

    /// Records one notification enqueued on `connections` sockets.
    pub fn record_delivered(&self, connections: u64) {
        self.add(Counter::NotificationsDelivered, connections);
    }

    pub fn record_undelivered(&self) {
        self.add(Counter::NotificationsUndelivered, 1);
    }

    pub fn record_eviction(&self) {
        self.add(Counter::Evictions, 1);
    }
}

/// Counter values at one instant, as reported by `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct WsMetricsSnapshot {
    pub connections_opened: u64,
    pub connections_closed: u64,
    pub active_connections: u64,
    pub messages_received: u64,
    pub messages_sent: u64,
    pub errors: u64,
    pub channel_joins: u64,
    pub channel_leaves: u64,
    pub notifications_delivered: u64,
    pub notifications_undelivered: u64,
    pub evictions: u64,
    pub uptime_secs: u64,
}
