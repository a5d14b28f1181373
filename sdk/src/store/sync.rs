//! Periodic reconciliation of the notification store.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use super::notifications::NotificationStore;

/// Default interval between reconciliation fetches.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30);

/// Handle to a running reconciliation task. Dropping it stops the task.
#[derive(Debug)]
pub struct SyncHandle {
    refresh: Arc<Notify>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Requests a reconciliation now, without waiting for the next tick.
    pub fn refresh_now(&self) {
        self.refresh.notify_one();
    }

    /// Stops the task.
    pub fn stop(&self) {
        self.task.abort();
    }

    /// Returns true once the task has stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Shortest interval [`spawn_sync`] accepts; shorter periods are raised to it.
pub const MIN_SYNC_INTERVAL: Duration = Duration::from_secs(1);

/// Spawns a task that reconciles `store` immediately and then every
/// `period`, but no more often than [`MIN_SYNC_INTERVAL`]. Failed fetches
/// are logged by the store and retried on the next tick.
pub fn spawn_sync(store: Arc<NotificationStore>, period: Duration) -> SyncHandle {
    if period < MIN_SYNC_INTERVAL {
        debug!(requested = ?period, "sync interval raised to the minimum");
    }
    let period = period.max(MIN_SYNC_INTERVAL);
    let refresh = Arc::new(Notify::new());
    let wake = Arc::clone(&refresh);

    let task = tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now(), period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                () = wake.notified() => {
                    debug!("notification refresh requested");
                    ticker.reset();
                }
            }
            // Errors are already logged; local state stays as it was.
            let _ = store.reconcile().await;
        }
    });

    SyncHandle { refresh, task }
}
