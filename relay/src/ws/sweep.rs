//! Idle connection sweep.
//!
//! Every tick, connections that showed no inbound traffic since the
//! previous tick are evicted; the rest have their liveness flag cleared and
//! receive a transport ping, whose pong marks them alive again.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::registry::ConnectionState;
use crate::state::Relay;

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Connections removed.
    pub evicted: usize,
    /// Connections pinged.
    pub pinged: usize,
}

/// Spawns the periodic sweep. Abort the returned handle to stop it.
pub fn spawn_sweep(relay: Relay, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let report = sweep_once(&relay).await;
            if report.evicted > 0 {
                info!(evicted = report.evicted, pinged = report.pinged, "idle sweep");
            } else {
                debug!(pinged = report.pinged, "idle sweep");
            }
        }
    })
}

/// Runs one sweep pass over every registered connection.
pub async fn sweep_once(relay: &Relay) -> SweepReport {
    let mut report = SweepReport::default();

    for (id, handle) in relay.registry().connections().await {
        if handle.state() == ConnectionState::Connecting {
            continue;
        }

        if handle.take_alive() && handle.ping() {
            report.pinged += 1;
            continue;
        }

        handle.set_state(ConnectionState::Closed);
        handle.close();
        if relay.registry().unregister(id).await {
            relay.metrics().record_eviction();
            report.evicted += 1;
            debug!(connection_id = id, "evicted idle connection");
        }
    }

    report
}
