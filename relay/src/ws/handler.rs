//! WebSocket connection handler.
//!
//! Provides the upgrade handler and the per-connection loop: a writer task
//! drains the connection's outbound queue into the socket while the reader
//! loop feeds inbound frames to the dispatch table. Binary frames are read
//! as UTF-8 text.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::messages::{ServerMessage, INVALID_FORMAT};
use super::session::Session;
use crate::error::RelayError;
use crate::registry::{ConnectionHandle, ConnectionState, Outbound};
use crate::state::Relay;

/// Query parameters of the upgrade request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    /// Claimed user id.
    pub user_id: Option<String>,
    /// Signed identity token.
    pub token: Option<String>,
}

/// WebSocket upgrade handler.
///
/// Resolves the caller's identity before upgrading; a rejected identity is
/// answered with `401` and no socket is opened.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(relay): State<Relay>,
) -> Response {
    let user_id = match relay
        .identity()
        .resolve(params.user_id.as_deref(), params.token.as_deref())
    {
        Ok(user_id) => user_id,
        Err(e) => {
            warn!(error = %e, "rejected websocket identity");
            relay.metrics().record_error();
            return RelayError::Unauthorized.into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_connection(socket, relay, user_id))
}

/// Runs one connection until the socket closes or the connection is evicted.
async fn handle_connection(socket: WebSocket, relay: Relay, user_id: String) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (tx, mut rx) = mpsc::channel::<Outbound>(relay.config().outbound_capacity());
    let handle = ConnectionHandle::new(tx);
    let connection_id = relay.registry().register(&user_id, handle.clone()).await;
    let session = Session::new(connection_id, user_id, handle);

    relay.metrics().record_connection_opened();
    info!(connection_id, user_id = %session.user_id(), "websocket connection opened");

    let metrics = Arc::clone(relay.metrics());
    let mut writer = tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            let message = match item {
                Outbound::Frame(frame) => match serde_json::to_string(&frame) {
                    Ok(json) => Message::Text(json.into()),
                    Err(e) => {
                        error!("Failed to serialize {} frame: {}", frame.kind(), e);
                        continue;
                    }
                },
                Outbound::Ping => Message::Ping(Bytes::new()),
                Outbound::Close => {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                }
            };

            let is_frame = matches!(message, Message::Text(_));
            if ws_sender.send(message).await.is_err() {
                break;
            }
            if is_frame {
                metrics.record_message_sent();
            }
        }
    });

    session.send(ServerMessage::connect(session.user_id()));
    session.handle().set_state(ConnectionState::Open);

    loop {
        tokio::select! {
            inbound = ws_receiver.next() => {
                let msg = match inbound {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        warn!(connection_id, "WebSocket error: {}", e);
                        relay.metrics().record_error();
                        break;
                    }
                    None => break,
                };

                session.handle().mark_alive();

                match msg {
                    Message::Text(text) => {
                        relay.metrics().record_message_received();
                        relay.dispatch().dispatch(&relay, &session, text.as_str()).await;
                    }
                    Message::Close(_) => {
                        debug!(connection_id, "close requested by peer");
                        break;
                    }
                    Message::Binary(bytes) => {
                        relay.metrics().record_message_received();
                        match std::str::from_utf8(&bytes) {
                            Ok(text) => {
                                relay.dispatch().dispatch(&relay, &session, text).await;
                            }
                            Err(_) => {
                                debug!(connection_id, "binary frame is not UTF-8");
                                relay.metrics().record_error();
                                session.send(ServerMessage::error(INVALID_FORMAT));
                            }
                        }
                    }
                    Message::Pong(_) | Message::Ping(_) => {}
                }
            }
            _ = &mut writer => {
                debug!(connection_id, "writer finished");
                break;
            }
        }
    }

    // Cleanup
    session.handle().set_state(ConnectionState::Closed);
    relay.registry().unregister(connection_id).await;
    relay.metrics().record_connection_closed();
    writer.abort();

    info!(connection_id, user_id = %session.user_id(), "websocket connection closed");
}
