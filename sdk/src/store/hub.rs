//! Publish/subscribe hub for received notifications.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use printrelay_core::Notification;

/// Identifier returned by [`NotificationHub::subscribe`].
pub type SubscriptionId = u64;

/// Subscriber callback.
pub type Subscriber = Arc<dyn Fn(&Notification) + Send + Sync>;

/// Fans received notifications out to any number of subscribers.
///
/// Created once by the application and shared by `Arc`.
#[derive(Default)]
pub struct NotificationHub {
    next_id: AtomicU64,
    subscribers: RwLock<Vec<(SubscriptionId, Subscriber)>>,
}

impl fmt::Debug for NotificationHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationHub")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl NotificationHub {
    /// Creates a hub with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subscriber.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(callback)));
        id
    }

    /// Removes a subscriber.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Calls every subscriber in subscription order. Returns how many were
    /// called.
    pub fn publish(&self, notification: &Notification) -> usize {
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in &subscribers {
            callback(notification);
        }
        subscribers.len()
    }

    /// Returns the number of subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
