//! Handler table for inbound frame types and lifecycle events.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::{json, Value};

use printrelay_core::kind;

/// Callback invoked with the frame (or lifecycle payload) for its tag.
pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// One handler per tag; registering again replaces the previous handler.
#[derive(Default)]
pub struct EventHandlers {
    handlers: RwLock<HashMap<String, EventHandler>>,
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("tags", &self.tags())
            .finish()
    }
}

impl EventHandlers {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the handler for a tag, returning the one it replaced.
    pub fn set(&self, tag: impl Into<String>, handler: EventHandler) -> Option<EventHandler> {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tag.into(), handler)
    }

    /// Removes the handler for a tag.
    pub fn remove(&self, tag: &str) -> bool {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(tag)
            .is_some()
    }

    /// Returns the handler for a tag.
    #[must_use]
    pub fn get(&self, tag: &str) -> Option<EventHandler> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(tag)
            .cloned()
    }

    /// Returns the registered tags, sorted.
    #[must_use]
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<_> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        tags.sort_unstable();
        tags
    }

    /// Invokes the handler for a tag. The table lock is not held during the
    /// call, so handlers may register or remove handlers.
    pub fn emit(&self, tag: &str, payload: &Value) -> bool {
        match self.get(tag) {
            Some(handler) => {
                handler(payload);
                true
            }
            None => false,
        }
    }
}

/// Payload of the `connect` lifecycle event.
#[must_use]
pub fn connect_event(user_id: &str) -> Value {
    json!({ "type": kind::CONNECT, "userId": user_id })
}

/// Payload of the `disconnect` lifecycle event.
#[must_use]
pub fn disconnect_event(reason: &str) -> Value {
    json!({ "type": kind::DISCONNECT, "reason": reason })
}

/// Payload of the `error` lifecycle event.
#[must_use]
pub fn error_event(message: &str) -> Value {
    json!({ "type": kind::ERROR, "message": message })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counter() -> (Arc<AtomicUsize>, EventHandler) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (count, Arc::new(move |_: &Value| {
            inner.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[test]
    fn test_last_registration_wins() {
        let handlers = EventHandlers::new();
        let (first, h1) = counter();
        let (second, h2) = counter();

        assert!(handlers.set("notification", h1).is_none());
        assert!(handlers.set("notification", h2).is_some());
        assert!(handlers.emit("notification", &json!({})));

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_and_missing_tag() {
        let handlers = EventHandlers::new();
        let (count, h) = counter();
        handlers.set("pong", h);

        assert!(handlers.remove("pong"));
        assert!(!handlers.remove("pong"));
        assert!(!handlers.emit("pong", &json!({})));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handler_can_reenter_table() {
        let handlers = Arc::new(EventHandlers::new());
        let table = Arc::clone(&handlers);
        handlers.set(
            "error",
            Arc::new(move |_: &Value| {
                table.remove("error");
            }),
        );

        assert!(handlers.emit("error", &error_event("boom")));
        assert!(handlers.tags().is_empty());
    }

    #[test]
    fn test_lifecycle_payloads() {
        assert_eq!(connect_event("u1")["userId"], "u1");
        assert_eq!(disconnect_event("closed")["type"], "disconnect");
        assert_eq!(error_event("boom")["message"], "boom");
    }
}
