//! HTTP trigger and health routes.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use tracing::warn;

use printrelay_core::{BroadcastRequest, NotifyRequest};

use crate::error::RelayError;
use crate::state::Relay;
use crate::trigger::DeliveryTrigger;
use crate::ws::metrics::WsMetricsSnapshot;

/// Header carrying the trigger key.
pub const TRIGGER_KEY_HEADER: &str = "x-relay-key";

/// Reply of the trigger routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryResponse {
    /// Always true; delivery failures are not request failures.
    pub success: bool,
    /// Connections the notification was enqueued on.
    pub delivered: usize,
}

/// Reply of `GET /health`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"ok"`.
    pub status: &'static str,
    /// Socket URL advertised to clients.
    pub public_url: String,
    /// Registered connections.
    pub connections: usize,
    /// Distinct connected users.
    pub users: usize,
    /// Non-empty channels.
    pub channels: usize,
    /// Counter snapshot.
    pub metrics: WsMetricsSnapshot,
}

fn authorize(relay: &Relay, headers: &HeaderMap) -> Result<(), RelayError> {
    let Some(expected) = relay.config().trigger_key.as_deref() else {
        return Ok(());
    };

    let presented = headers
        .get(TRIGGER_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    if presented == Some(expected) {
        Ok(())
    } else {
        warn!("trigger call rejected: missing or wrong key");
        Err(RelayError::Unauthorized)
    }
}

/// `POST /notify`: pushes a notification to one user.
pub async fn notify(
    State(relay): State<Relay>,
    headers: HeaderMap,
    payload: Result<Json<NotifyRequest>, JsonRejection>,
) -> Result<Json<DeliveryResponse>, RelayError> {
    authorize(&relay, &headers)?;
    let Json(request) = payload.map_err(|e| RelayError::MalformedPayload(e.body_text()))?;

    let outcome = DeliveryTrigger::new(relay)
        .deliver(&request.user_id, &request.notification)
        .await;

    Ok(Json(DeliveryResponse {
        success: true,
        delivered: outcome.connections(),
    }))
}

/// `POST /broadcast`: pushes a notification to every member of a channel.
pub async fn broadcast(
    State(relay): State<Relay>,
    headers: HeaderMap,
    payload: Result<Json<BroadcastRequest>, JsonRejection>,
) -> Result<Json<DeliveryResponse>, RelayError> {
    authorize(&relay, &headers)?;
    let Json(request) = payload.map_err(|e| RelayError::MalformedPayload(e.body_text()))?;

    let delivered = relay.broadcast(&request.channel, &request.notification).await;

    Ok(Json(DeliveryResponse {
        success: true,
        delivered,
    }))
}

/// `GET /health`.
pub async fn health(State(relay): State<Relay>) -> Json<HealthResponse> {
    let registry = relay.registry();
    Json(HealthResponse {
        status: "ok",
        public_url: relay.config().public_url.clone(),
        connections: registry.connection_count().await,
        users: registry.user_count().await,
        channels: registry.channel_count().await,
        metrics: relay.metrics().snapshot(),
    })
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderName, HeaderValue, StatusCode};
    use axum_test::TestServer;
    use serde_json::{json, Value};
    use tokio::sync::mpsc;

    use super::*;
    use crate::config::RelayConfig;
    use crate::registry::ConnectionHandle;
    use crate::server::router;

    fn body() -> Value {
        json!({
            "userId": "u1",
            "notification": {
                "id": "n1",
                "message": "Your order \"a.pdf\" is now printing",
                "orderId": "o1",
                "orderFilename": "a.pdf",
                "status": "printing",
                "createdAt": "2026-01-01T00:00:00.000Z",
                "read": false
            }
        })
    }

    fn server(relay: &Relay) -> TestServer {
        TestServer::new(router(relay.clone())).expect("test server")
    }

    #[tokio::test]
    async fn test_notify_offline_user_succeeds() {
        let relay = Relay::new(RelayConfig::default());
        let response = server(&relay).post("/notify").json(&body()).await;

        response.assert_status_ok();
        response.assert_json(&json!({"success": true, "delivered": 0}));
    }

    #[tokio::test]
    async fn test_notify_online_user_reports_connections() {
        let relay = Relay::new(RelayConfig::default());
        let (tx1, _rx1) = mpsc::channel(4);
        let (tx2, _rx2) = mpsc::channel(4);
        relay.registry().register("u1", ConnectionHandle::new(tx1)).await;
        relay.registry().register("u1", ConnectionHandle::new(tx2)).await;

        let response = server(&relay).post("/notify").json(&body()).await;
        response.assert_json(&json!({"success": true, "delivered": 2}));
    }

    #[tokio::test]
    async fn test_notify_rejects_malformed_body() {
        let relay = Relay::new(RelayConfig::default());
        let response = server(&relay)
            .post("/notify")
            .json(&json!({"userId": "u1"}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let value: Value = response.json();
        assert_eq!(value["success"], false);
    }

    #[tokio::test]
    async fn test_trigger_key_is_enforced() {
        let relay = Relay::new(RelayConfig::default().with_trigger_key("s3cret"));
        let server = server(&relay);

        server
            .post("/notify")
            .json(&body())
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        server
            .post("/notify")
            .add_header(
                HeaderName::from_static(TRIGGER_KEY_HEADER),
                HeaderValue::from_static("wrong"),
            )
            .json(&body())
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        server
            .post("/notify")
            .add_header(
                HeaderName::from_static(TRIGGER_KEY_HEADER),
                HeaderValue::from_static("s3cret"),
            )
            .json(&body())
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn test_broadcast_to_channel() {
        let relay = Relay::new(RelayConfig::default());
        let (tx, _rx) = mpsc::channel(4);
        let id = relay.registry().register("staff", ConnectionHandle::new(tx)).await;
        relay.registry().join(id, "admin").await;

        let mut request = body();
        request["channel"] = json!("admin");

        let response = server(&relay).post("/broadcast").json(&request).await;
        response.assert_json(&json!({"success": true, "delivered": 1}));
    }

    #[tokio::test]
    async fn test_health_reports_registry_counts() {
        let relay = Relay::new(RelayConfig::default().with_public_url("wss://print.example"));
        let (tx, _rx) = mpsc::channel(4);
        relay.registry().register("u1", ConnectionHandle::new(tx)).await;

        let response = server(&relay).get("/health").await;
        response.assert_status_ok();
        let value: Value = response.json();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["publicUrl"], "wss://print.example");
        assert_eq!(value["connections"], 1);
        assert_eq!(value["users"], 1);
        assert_eq!(value["channels"], 0);
        assert!(value["metrics"].is_object());
    }
}
