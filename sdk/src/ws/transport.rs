//! Transport seam between the connection manager and the socket library.
//!
//! A [`Connector`] opens one socket and hands back a [`Transport`]: an
//! outbound text queue plus a stream of inbound events. Dropping the
//! transport closes the socket.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use futures_util::future::{BoxFuture, FutureExt};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use super::error::WsError;

/// Event produced by an open transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Text frame.
    Text(String),
    /// Socket closed, with the peer's reason if any.
    Closed(Option<String>),
    /// Transport error. A `Closed` event follows.
    Error(String),
}

/// One open socket.
#[derive(Debug)]
pub struct Transport {
    /// Outbound text frames.
    pub outbound: mpsc::UnboundedSender<String>,
    /// Inbound events.
    pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Opens transports.
pub trait Connector: Send + Sync + fmt::Debug {
    /// Connects to a URL.
    fn connect(&self, url: String) -> BoxFuture<'static, Result<Transport, WsError>>;
}

/// [`Connector`] backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

impl Connector for TungsteniteConnector {
    fn connect(&self, url: String) -> BoxFuture<'static, Result<Transport, WsError>> {
        async move {
            let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str()).await?;

            let (mut sink, mut source) = ws_stream.split();
            let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
            let (in_tx, in_rx) = mpsc::unbounded_channel();

            tokio::spawn(async move {
                while let Some(text) = out_rx.recv().await {
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        return;
                    }
                }
                // transport dropped by its owner
                let _ = sink.send(Message::Close(None)).await;
            });

            tokio::spawn(async move {
                while let Some(result) = source.next().await {
                    let event = match result {
                        Ok(Message::Text(text)) => TransportEvent::Text(text.as_str().to_owned()),
                        Ok(Message::Close(frame)) => {
                            let reason = frame.map(|f| f.reason.as_str().to_owned());
                            let _ = in_tx.send(TransportEvent::Closed(reason));
                            return;
                        }
                        Ok(_) => continue,
                        Err(e) => {
                            debug!("socket read failed: {}", e);
                            let _ = in_tx.send(TransportEvent::Error(e.to_string()));
                            let _ = in_tx.send(TransportEvent::Closed(None));
                            return;
                        }
                    };
                    if in_tx.send(event).is_err() {
                        return;
                    }
                }
                let _ = in_tx.send(TransportEvent::Closed(None));
            });

            Ok(Transport {
                outbound: out_tx,
                inbound: in_rx,
            })
        }
        .boxed()
    }
}

/// In-memory [`Connector`].
///
/// Every successful connect queues a [`MemoryPeer`] holding the server side
/// of the transport. Useful for driving a connection manager without a
/// network.
#[derive(Debug, Default)]
pub struct MemoryConnector {
    attempts: AtomicUsize,
    refuse: AtomicBool,
    reject_status: AtomicU16,
    urls: Mutex<Vec<String>>,
    peers: Mutex<VecDeque<MemoryPeer>>,
}

impl MemoryConnector {
    /// Creates a connector that accepts every connect.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a connector that refuses every connect.
    #[must_use]
    pub fn refusing() -> Self {
        let connector = Self::default();
        connector.set_refuse(true);
        connector
    }

    /// Creates a connector whose upgrades are answered with `status`.
    #[must_use]
    pub fn rejecting(status: u16) -> Self {
        let connector = Self::default();
        connector.reject_status.store(status, Ordering::SeqCst);
        connector
    }

    /// Switches between refusing and accepting connects.
    pub fn set_refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Returns the number of connect attempts.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Returns every URL connected to, in order.
    #[must_use]
    pub fn urls(&self) -> Vec<String> {
        self.urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Takes the oldest unclaimed server side.
    #[must_use]
    pub fn take_peer(&self) -> Option<MemoryPeer> {
        self.peers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, url: String) -> BoxFuture<'static, Result<Transport, WsError>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url);

        let status = self.reject_status.load(Ordering::SeqCst);
        let result = if status != 0 {
            Err(WsError::Rejected(status))
        } else if self.refuse.load(Ordering::SeqCst) {
            Err(WsError::Connection("connection refused".to_string()))
        } else {
            let (out_tx, out_rx) = mpsc::unbounded_channel();
            let (in_tx, in_rx) = mpsc::unbounded_channel();
            self.peers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_back(MemoryPeer {
                    sent: out_rx,
                    events: in_tx,
                });
            Ok(Transport {
                outbound: out_tx,
                inbound: in_rx,
            })
        };

        async move { result }.boxed()
    }
}

/// Server side of a [`MemoryConnector`] transport.
#[derive(Debug)]
pub struct MemoryPeer {
    sent: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl MemoryPeer {
    /// Delivers a text frame to the client.
    pub fn push_text(&self, text: impl Into<String>) -> bool {
        self.events.send(TransportEvent::Text(text.into())).is_ok()
    }

    /// Closes the transport from the server side.
    pub fn close(&self, reason: Option<&str>) -> bool {
        self.events
            .send(TransportEvent::Closed(reason.map(str::to_owned)))
            .is_ok()
    }

    /// Reports a transport error followed by a close.
    pub fn fail(&self, message: &str) -> bool {
        self.events
            .send(TransportEvent::Error(message.to_string()))
            .is_ok()
            && self.close(None)
    }

    /// Returns the frames the client sent since the last call.
    pub fn drain_sent(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(text) = self.sent.try_recv() {
            frames.push(text);
        }
        frames
    }

    /// Returns true once the client dropped its end of the transport.
    #[must_use]
    pub fn is_closed_by_client(&self) -> bool {
        self.events.is_closed()
    }
}
