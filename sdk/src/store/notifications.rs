//! Client-side notification state.
//!
//! Pushes are prepended as they arrive and never deduplicated; the periodic
//! reconciliation fetch replaces the list wholesale. Read receipts are
//! applied locally first and rolled back if the server call fails.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use serde_json::Value;
use tracing::{debug, warn};

use printrelay_core::{kind, Notification};

use super::api::NotificationApi;
use super::hub::NotificationHub;
use crate::client::ClientError;
use crate::ws::ConnectionManager;

#[derive(Debug, Clone)]
struct Entry {
    /// Local identity, stable across prepends; notification ids may repeat.
    key: u64,
    notification: Notification,
}

/// Ordered, newest-first notification list.
pub struct NotificationStore {
    api: Arc<dyn NotificationApi>,
    next_key: AtomicU64,
    entries: RwLock<Vec<Entry>>,
}

impl fmt::Debug for NotificationStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationStore")
            .field("len", &self.len())
            .field("unread", &self.unread_count())
            .finish()
    }
}

impl NotificationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(api: Arc<dyn NotificationApi>) -> Self {
        Self {
            api,
            next_key: AtomicU64::new(0),
            entries: RwLock::new(Vec::new()),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Entry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn entry(&self, notification: Notification) -> Entry {
        Entry {
            key: self.next_key.fetch_add(1, Ordering::Relaxed),
            notification,
        }
    }

    /// Returns the notifications, newest first.
    #[must_use]
    pub fn items(&self) -> Vec<Notification> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|e| e.notification.clone())
            .collect()
    }

    /// Returns the number of notifications.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of unread notifications.
    #[must_use]
    pub fn unread_count(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| !e.notification.read)
            .count()
    }

    /// Validates a pushed frame and prepends it. Returns false for frames
    /// that do not have the notification shape.
    pub fn receive_push(&self, frame: &Value) -> bool {
        self.accept_push(frame).is_some()
    }

    fn accept_push(&self, frame: &Value) -> Option<Notification> {
        let notification = Notification::from_value(frame)?;
        let entry = self.entry(notification.clone());
        self.write().insert(0, entry);
        Some(notification)
    }

    /// Replaces the whole list.
    pub fn replace_all(&self, items: Vec<Notification>) {
        let entries: Vec<Entry> = items.into_iter().map(|n| self.entry(n)).collect();
        *self.write() = entries;
    }

    /// Fetches the authoritative list and replaces local state with it.
    ///
    /// On failure local state is kept.
    ///
    /// # Errors
    ///
    /// Returns the fetch error.
    pub async fn reconcile(&self) -> Result<usize, ClientError> {
        match self.api.fetch_notifications().await {
            Ok(items) => {
                let count = items.len();
                self.replace_all(items);
                debug!(count, "notifications reconciled");
                Ok(count)
            }
            Err(e) => {
                warn!("notification reconciliation failed: {}", e);
                Err(e)
            }
        }
    }

    /// Marks one notification read, locally first.
    ///
    /// # Errors
    ///
    /// Returns the server error after rolling the local change back.
    pub async fn mark_as_read(&self, id: &str) -> Result<(), ClientError> {
        let flipped = self.flip_unread(|n| n.id == id);

        match self.api.mark_read(id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(notification_id = id, "mark as read failed, rolling back: {}", e);
                self.restore_unread(&flipped);
                Err(e)
            }
        }
    }

    /// Marks every notification read, locally first.
    ///
    /// # Errors
    ///
    /// Returns the server error after rolling the local change back.
    pub async fn mark_all_as_read(&self) -> Result<(), ClientError> {
        let flipped = self.flip_unread(|_| true);

        match self.api.mark_all_read().await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(count = flipped.len(), "mark all as read failed, rolling back: {}", e);
                self.restore_unread(&flipped);
                Err(e)
            }
        }
    }

    /// Sets `read` on unread entries matching `select`; returns their keys.
    fn flip_unread<F>(&self, select: F) -> HashSet<u64>
    where
        F: Fn(&Notification) -> bool,
    {
        let mut entries = self.write();
        entries
            .iter_mut()
            .filter(|e| !e.notification.read && select(&e.notification))
            .map(|e| {
                e.notification.read = true;
                e.key
            })
            .collect()
    }

    fn restore_unread(&self, keys: &HashSet<u64>) {
        if keys.is_empty() {
            return;
        }
        for entry in self.write().iter_mut().filter(|e| keys.contains(&e.key)) {
            entry.notification.read = false;
        }
    }

    /// Routes the manager's `notification` frames into this store and
    /// publishes each accepted notification to the hub.
    ///
    /// Replaces any `notification` handler already set on the manager.
    pub fn attach(self: &Arc<Self>, manager: &ConnectionManager, hub: Arc<NotificationHub>) {
        let store = Arc::clone(self);
        manager.on(kind::NOTIFICATION, move |frame: &Value| {
            match store.accept_push(frame) {
                Some(notification) => {
                    hub.publish(&notification);
                }
                None => debug!("ignoring notification frame with unexpected shape"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex;
    use std::time::Duration;

    use futures_util::future::{BoxFuture, FutureExt};
    use serde_json::json;
    use tokio::sync::oneshot;

    use super::*;
    use crate::ws::{Connector, MemoryConnector, WsConfig};
    use printrelay_core::OrderStatus;

    #[derive(Default)]
    struct MockApi {
        remote: Mutex<Vec<Notification>>,
        fail: AtomicBool,
        gate: Mutex<Option<oneshot::Receiver<()>>>,
        calls: Mutex<Vec<String>>,
    }

    impl MockApi {
        fn failing() -> Self {
            let api = Self::default();
            api.fail.store(true, Ordering::SeqCst);
            api
        }

        fn gated(&self) -> oneshot::Sender<()> {
            let (tx, rx) = oneshot::channel();
            *self.gate.lock().expect("gate") = Some(rx);
            tx
        }

        fn outcome(&self, call: String) -> BoxFuture<'_, Result<(), ClientError>> {
            self.calls.lock().expect("calls").push(call);
            let gate = self.gate.lock().expect("gate").take();
            let fail = self.fail.load(Ordering::SeqCst);
            async move {
                if let Some(gate) = gate {
                    let _ = gate.await;
                }
                if fail {
                    Err(ClientError::Api {
                        status: 500,
                        message: "database unavailable".to_string(),
                    })
                } else {
                    Ok(())
                }
            }
            .boxed()
        }
    }

    impl NotificationApi for MockApi {
        fn fetch_notifications(&self) -> BoxFuture<'_, Result<Vec<Notification>, ClientError>> {
            self.calls.lock().expect("calls").push("fetch".to_string());
            let result = if self.fail.load(Ordering::SeqCst) {
                Err(ClientError::Timeout)
            } else {
                Ok(self.remote.lock().expect("remote").clone())
            };
            async move { result }.boxed()
        }

        fn mark_read<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), ClientError>> {
            self.outcome(format!("mark_read:{}", id))
        }

        fn mark_all_read(&self) -> BoxFuture<'_, Result<(), ClientError>> {
            self.outcome("mark_all_read".to_string())
        }
    }

    fn push_frame(id: &str) -> Value {
        json!({
            "type": "notification",
            "id": id,
            "message": "m",
            "orderId": "o1",
            "orderFilename": "f",
            "status": "ready_to_pickup",
            "createdAt": "2024-01-01T00:00:00Z",
            "read": false,
            "timestamp": "2024-01-01T00:00:01.000Z"
        })
    }

    fn new_store(api: MockApi) -> (Arc<MockApi>, Arc<NotificationStore>) {
        let api = Arc::new(api);
        let store = Arc::new(NotificationStore::new(Arc::clone(&api) as Arc<dyn NotificationApi>));
        (api, store)
    }

    #[test]
    fn test_push_is_prepended_unread() {
        let (_, store) = new_store(MockApi::default());
        assert!(store.receive_push(&push_frame("n0")));
        assert!(store.receive_push(&push_frame("n1")));

        let items = store.items();
        assert_eq!(items[0].id, "n1");
        assert!(!items[0].read);
        assert_eq!(items[0].status, "ready_to_pickup");
        assert_eq!(store.unread_count(), 2);
    }

    #[test]
    fn test_invalid_push_is_ignored() {
        let (_, store) = new_store(MockApi::default());
        assert!(!store.receive_push(&json!({"type": "notification", "id": "n1"})));
        assert!(!store.receive_push(&json!({"id": 5, "message": "m"})));
        assert!(store.is_empty());
    }

    #[test]
    fn test_duplicate_pushes_are_kept() {
        let (_, store) = new_store(MockApi::default());
        store.receive_push(&push_frame("n1"));
        store.receive_push(&push_frame("n1"));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_reconcile_replaces_wholesale() {
        let (api, store) = new_store(MockApi::default());
        store.receive_push(&push_frame("n1"));
        store.receive_push(&push_frame("n1"));

        let server_copy = Notification::from_value(&push_frame("n1")).expect("shape");
        *api.remote.lock().expect("remote") = vec![Notification {
            read: true,
            ..server_copy
        }];

        assert_eq!(store.reconcile().await.expect("reconcile"), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.unread_count(), 0);
    }

    #[tokio::test]
    async fn test_reconcile_failure_keeps_local_state() {
        let (_, store) = new_store(MockApi::failing());
        store.receive_push(&push_frame("n1"));

        assert!(store.reconcile().await.is_err());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_mark_as_read_flips_before_server_answers() {
        let (api, store) = new_store(MockApi::default());
        store.receive_push(&push_frame("n1"));
        let release = api.gated();

        let task = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.mark_as_read("n1").await })
        };
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(store.items()[0].read);
        release.send(()).expect("release");
        assert!(task.await.expect("join").is_ok());
        assert!(store.items()[0].read);
        assert_eq!(api.calls.lock().expect("calls").as_slice(), ["mark_read:n1"]);
    }

    #[tokio::test]
    async fn test_mark_as_read_rolls_back_on_failure() {
        let (_, store) = new_store(MockApi::failing());
        store.receive_push(&push_frame("n1"));
        store.receive_push(&push_frame("n2"));

        assert!(store.mark_as_read("n1").await.is_err());
        assert_eq!(store.unread_count(), 2);
    }

    #[tokio::test]
    async fn test_mark_all_rollback_restores_only_flipped_entries() {
        let (api, store) = new_store(MockApi::default());
        store.receive_push(&push_frame("n1"));
        store.receive_push(&push_frame("n2"));
        store.mark_as_read("n2").await.expect("mark n2");

        api.fail.store(true, Ordering::SeqCst);
        assert!(store.mark_all_as_read().await.is_err());

        let items = store.items();
        assert!(items[0].read, "n2 was read before and stays read");
        assert!(!items[1].read, "n1 is rolled back");
    }

    #[tokio::test]
    async fn test_mark_all_as_read() {
        let (_, store) = new_store(MockApi::default());
        store.receive_push(&push_frame("n1"));
        store.receive_push(&push_frame("n2"));

        store.mark_all_as_read().await.expect("mark all");
        assert_eq!(store.unread_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attach_routes_pushes_to_store_and_hub() {
        let connector = Arc::new(MemoryConnector::new());
        let manager = crate::ws::ConnectionManager::with_connector(
            WsConfig::new("ws://relay.test"),
            Arc::clone(&connector) as Arc<dyn Connector>,
        )
        .expect("manager");

        let (_, store) = new_store(MockApi::default());
        let hub = Arc::new(NotificationHub::new());
        let toasts = Arc::new(Mutex::new(Vec::new()));
        {
            let toasts = Arc::clone(&toasts);
            hub.subscribe(move |n: &Notification| {
                toasts.lock().expect("toasts").push(n.id.clone());
            });
        }
        store.attach(&manager, Arc::clone(&hub));

        manager.connect("u1");
        tokio::time::sleep(Duration::from_millis(1)).await;
        let peer = connector.take_peer().expect("peer");
        peer.push_text(push_frame("n1").to_string());
        peer.push_text(json!({"type": "notification", "id": "broken"}).to_string());
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(store.len(), 1);
        assert_eq!(store.items()[0].order_status(), Some(OrderStatus::ReadyToPickup));
        assert_eq!(*toasts.lock().expect("toasts"), vec!["n1".to_string()]);
    }
}
