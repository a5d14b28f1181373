//! Reconnecting connection manager.
//!
//! [`ConnectionManager`] owns one logical socket to the relay. Each
//! [`connect`](ConnectionManager::connect) spawns a supervisor task that
//! opens the transport, runs the heartbeat while the socket is open, and
//! schedules reconnects after a drop until the attempt budget is spent.
//!
//! State transitions:
//!
//! ```text
//! Idle -> Connecting -> Open -> Closed -> Connecting (retry) -> ...
//!              \-> Error -> Connecting (retry) -> ...
//! any -> Idle (disconnect)
//! ```

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use printrelay_core::kind;

use super::config::WsConfig;
use super::error::WsError;
use super::events::{connect_event, disconnect_event, error_event, EventHandler, EventHandlers};
use super::messages::ClientMessage;
use super::transport::{Connector, Transport, TransportEvent, TungsteniteConnector};

/// Client-side connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never connected, or explicitly disconnected.
    Idle,
    /// Transport being opened.
    Connecting,
    /// Frames flow both ways.
    Open,
    /// Socket dropped; a reconnect may be pending.
    Closed,
    /// Last connect attempt failed; a reconnect may be pending.
    Error,
}

/// Reconnecting client for the relay.
#[derive(Debug)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    config: WsConfig,
    connector: Arc<dyn Connector>,
    handlers: EventHandlers,
    shared: Mutex<Shared>,
}

#[derive(Debug)]
struct Shared {
    state: ConnectionState,
    user_id: Option<String>,
    retry_count: u32,
    outbound: Option<mpsc::UnboundedSender<String>>,
    channels: HashSet<String>,
    supervisor: Option<JoinHandle<()>>,
    /// Bumped on every connect and disconnect; a supervisor only mutates
    /// state while its generation is current.
    generation: u64,
}

impl ConnectionManager {
    /// Creates a manager that connects with `tokio-tungstenite`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: WsConfig) -> Result<Self, WsError> {
        Self::with_connector(config, Arc::new(TungsteniteConnector))
    }

    /// Creates a manager over a custom connector.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_connector(config: WsConfig, connector: Arc<dyn Connector>) -> Result<Self, WsError> {
        config.validate()?;

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                connector,
                handlers: EventHandlers::new(),
                shared: Mutex::new(Shared {
                    state: ConnectionState::Idle,
                    user_id: None,
                    retry_count: 0,
                    outbound: None,
                    channels: HashSet::new(),
                    supervisor: None,
                    generation: 0,
                }),
            }),
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &WsConfig {
        &self.inner.config
    }

    /// Starts connecting as `user_id`. Does nothing while connecting or open.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(&self, user_id: impl Into<String>) {
        let user_id = user_id.into();
        let mut shared = self.inner.lock();

        if matches!(shared.state, ConnectionState::Connecting | ConnectionState::Open) {
            debug!(user_id = %user_id, state = ?shared.state, "connect ignored");
            return;
        }

        if let Some(task) = shared.supervisor.take() {
            task.abort();
        }
        shared.generation += 1;
        shared.state = ConnectionState::Connecting;
        shared.retry_count = 0;
        shared.user_id = Some(user_id.clone());

        let generation = shared.generation;
        shared.supervisor = Some(tokio::spawn(supervise(
            Arc::clone(&self.inner),
            generation,
            user_id,
        )));
    }

    /// Closes the socket and cancels heartbeat and reconnect timers.
    ///
    /// Clears the channel set and the retry count; the next
    /// [`connect`](Self::connect) starts fresh.
    pub fn disconnect(&self) {
        let was_open = {
            let mut shared = self.inner.lock();
            shared.shutdown() == ConnectionState::Open
        };

        if was_open {
            self.inner
                .handlers
                .emit(kind::DISCONNECT, &disconnect_event("client disconnect"));
        }
    }

    /// Sends a message. Returns false if the socket is not open.
    pub fn send(&self, message: &ClientMessage) -> bool {
        self.inner.send_message(message)
    }

    /// Sends an arbitrary JSON frame. Returns false if the socket is not open.
    pub fn send_raw(&self, frame: &Value) -> bool {
        self.inner.send_text(frame.to_string())
    }

    /// Requests to join a channel. The channel is tracked only if the
    /// request was sent.
    pub fn join_channel(&self, channel: &str) -> bool {
        if !self.send(&ClientMessage::join(channel)) {
            return false;
        }
        self.inner.lock().channels.insert(channel.to_string());
        true
    }

    /// Requests to leave a channel. The channel is untracked only if the
    /// request was sent.
    pub fn leave_channel(&self, channel: &str) -> bool {
        if !self.send(&ClientMessage::leave(channel)) {
            return false;
        }
        self.inner.lock().channels.remove(channel);
        true
    }

    /// Returns the tracked channels, sorted.
    #[must_use]
    pub fn channels(&self) -> Vec<String> {
        let mut channels: Vec<_> = self.inner.lock().channels.iter().cloned().collect();
        channels.sort_unstable();
        channels
    }

    /// Returns the connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// Returns the number of reconnect attempts since the last open.
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.inner.lock().retry_count
    }

    /// Returns the user the manager connects as.
    #[must_use]
    pub fn user_id(&self) -> Option<String> {
        self.inner.lock().user_id.clone()
    }

    /// Sets the handler for a frame type or lifecycle event, replacing any
    /// previous handler for the same tag.
    pub fn on<F>(&self, tag: impl Into<String>, handler: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let handler: EventHandler = Arc::new(handler);
        self.inner.handlers.set(tag, handler);
    }

    /// Removes the handler for a tag.
    pub fn off(&self, tag: &str) -> bool {
        self.inner.handlers.remove(tag)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.inner.lock().shutdown();
    }
}

impl Shared {
    /// Stops the supervisor and resets to `Idle`. Returns the prior state.
    fn shutdown(&mut self) -> ConnectionState {
        if let Some(task) = self.supervisor.take() {
            task.abort();
        }
        self.generation += 1;
        self.outbound = None;
        self.channels.clear();
        self.retry_count = 0;
        self.user_id = None;
        std::mem::replace(&mut self.state, ConnectionState::Idle)
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state_if_current(&self, generation: u64, state: ConnectionState) -> bool {
        let mut shared = self.lock();
        if shared.generation != generation {
            return false;
        }
        shared.state = state;
        true
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    fn send_text(&self, text: String) -> bool {
        let shared = self.lock();
        if shared.state != ConnectionState::Open {
            return false;
        }
        shared
            .outbound
            .as_ref()
            .is_some_and(|tx| tx.send(text).is_ok())
    }

    fn send_message(&self, message: &ClientMessage) -> bool {
        match serde_json::to_string(message) {
            Ok(text) => self.send_text(text),
            Err(e) => {
                warn!("Failed to serialize message: {}", e);
                false
            }
        }
    }

    fn handle_text(&self, text: &str) {
        let frame: Value = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("dropping unparseable frame: {}", e);
                return;
            }
        };

        let Some(tag) = frame.get("type").and_then(Value::as_str) else {
            debug!("dropping frame without type");
            return;
        };

        // the open transition already emitted `connect`
        if tag == kind::CONNECT {
            debug!("relay greeting received");
            return;
        }

        if !self.handlers.emit(tag, &frame) {
            debug!(tag, "no handler for frame");
        }
    }
}

async fn supervise(inner: Arc<Inner>, generation: u64, user_id: String) {
    let url = match inner.config.connection_url(&user_id) {
        Ok(url) => url.to_string(),
        Err(e) => {
            give_up(&inner, generation, &user_id, &e);
            return;
        }
    };

    loop {
        if !inner.set_state_if_current(generation, ConnectionState::Connecting) {
            return;
        }

        match inner.connector.connect(url.clone()).await {
            Ok(transport) => {
                let reason = run_open(&inner, generation, &user_id, transport).await;
                if !inner.is_current(generation) {
                    return;
                }
                info!(user_id = %user_id, reason = %reason, "relay connection closed");
                inner
                    .handlers
                    .emit(kind::DISCONNECT, &disconnect_event(&reason));
            }
            Err(e) => {
                if !inner.set_state_if_current(generation, ConnectionState::Error) {
                    return;
                }
                if e.is_permanent() {
                    give_up(&inner, generation, &user_id, &e);
                    return;
                }
                warn!(user_id = %user_id, "relay connection failed: {}", e);
                inner.handlers.emit(kind::ERROR, &error_event(&e.to_string()));
                inner
                    .handlers
                    .emit(kind::DISCONNECT, &disconnect_event("connect failed"));
            }
        }

        let attempt = {
            let mut shared = inner.lock();
            if shared.generation != generation {
                return;
            }
            if shared.retry_count < inner.config.max_reconnect_attempts {
                shared.retry_count += 1;
                Some(shared.retry_count)
            } else {
                shared.state = ConnectionState::Closed;
                None
            }
        };

        let Some(attempt) = attempt else {
            warn!(
                user_id = %user_id,
                attempts = inner.config.max_reconnect_attempts,
                "giving up on relay connection"
            );
            return;
        };

        debug!(user_id = %user_id, attempt, delay = ?inner.config.reconnect_delay, "scheduling reconnect");
        time::sleep(inner.config.reconnect_delay).await;
    }
}

/// Reports an error no retry can fix and leaves the manager closed.
fn give_up(inner: &Inner, generation: u64, user_id: &str, error: &WsError) {
    if !inner.set_state_if_current(generation, ConnectionState::Error) {
        return;
    }
    warn!(user_id = %user_id, "relay connection failed permanently: {}", error);
    inner.handlers.emit(kind::ERROR, &error_event(&error.to_string()));
    inner
        .handlers
        .emit(kind::DISCONNECT, &disconnect_event("connect failed"));
    inner.set_state_if_current(generation, ConnectionState::Closed);
}

/// Drives an open transport until it closes. Returns the close reason.
async fn run_open(inner: &Inner, generation: u64, user_id: &str, transport: Transport) -> String {
    let Transport {
        outbound,
        mut inbound,
    } = transport;

    let rejoin: Vec<String> = {
        let mut shared = inner.lock();
        if shared.generation != generation {
            return "superseded".to_string();
        }
        shared.state = ConnectionState::Open;
        shared.retry_count = 0;
        shared.outbound = Some(outbound);
        shared.channels.iter().cloned().collect()
    };

    info!(user_id, "relay connection open");
    for channel in rejoin {
        inner.send_message(&ClientMessage::join(channel));
    }
    inner.handlers.emit(kind::CONNECT, &connect_event(user_id));

    let period = inner.config.heartbeat_interval;
    let mut heartbeat = time::interval_at(Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let reason = loop {
        tokio::select! {
            event = inbound.recv() => match event {
                Some(TransportEvent::Text(text)) => inner.handle_text(&text),
                Some(TransportEvent::Error(message)) => {
                    warn!(user_id, "relay transport error: {}", message);
                    inner.handlers.emit(kind::ERROR, &error_event(&message));
                }
                Some(TransportEvent::Closed(reason)) => {
                    break reason
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "connection closed".to_string());
                }
                None => break "transport dropped".to_string(),
            },
            _ = heartbeat.tick() => {
                if !inner.send_message(&ClientMessage::Heartbeat) {
                    debug!(user_id, "heartbeat not sent");
                }
            }
        }
    };

    let mut shared = inner.lock();
    if shared.generation == generation {
        shared.outbound = None;
        shared.state = ConnectionState::Closed;
    }
    reason
}
