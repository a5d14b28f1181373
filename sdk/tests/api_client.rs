//! `ApiClient` and `NotificationStore` against a local mock of the
//! application's notification API.

use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use printrelay_sdk::{ApiClient, ClientConfig, ClientError, NotificationStore};

#[derive(Clone, Default)]
struct MockApi {
    puts: Arc<Mutex<Vec<Value>>>,
    fail_puts: bool,
}

fn notification(id: &str, read: bool) -> Value {
    json!({
        "id": id,
        "message": "Your order \"poster.png\" is now being printed",
        "orderId": "o7",
        "orderFilename": "poster.png",
        "status": "printing",
        "createdAt": "2026-03-01T10:00:00Z",
        "read": read
    })
}

async fn list() -> Json<Value> {
    Json(json!({"notifications": [notification("n2", false), notification("n1", true)]}))
}

async fn count() -> Json<Value> {
    Json(json!({"unreadCount": 1}))
}

async fn mark(State(api): State<MockApi>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    api.puts.lock().expect("puts").push(body);
    if api.fail_puts {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "database unavailable"})),
        )
    } else {
        (StatusCode::OK, Json(json!({"success": true})))
    }
}

async fn serve(api: MockApi) -> String {
    let app = Router::new()
        .route("/api/notifications", get(list).put(mark))
        .route("/api/notifications/count", get(count))
        .with_state(api);

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_list_and_count() {
    let base = serve(MockApi::default()).await;
    let client = ApiClient::new(ClientConfig::new(base).with_auth_token("session")).expect("client");

    let items = client.list_notifications().await.expect("list");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, "n2");
    assert_eq!(items[0].order_filename, "poster.png");
    assert_eq!(client.unread_count().await.expect("count"), 1);
}

#[tokio::test]
async fn test_mark_read_bodies() {
    let api = MockApi::default();
    let base = serve(api.clone()).await;
    let client = ApiClient::with_base_url(base).expect("client");

    client.mark_notification_read("n2").await.expect("mark one");
    client.mark_all_notifications_read().await.expect("mark all");

    assert_eq!(
        *api.puts.lock().expect("puts"),
        vec![
            json!({"action": "mark_read", "notificationId": "n2"}),
            json!({"action": "mark_all_read"}),
        ]
    );
}

#[tokio::test]
async fn test_store_reconciles_and_rolls_back_over_http() {
    let api = MockApi {
        fail_puts: true,
        ..MockApi::default()
    };
    let base = serve(api).await;
    let client = ApiClient::with_base_url(base).expect("client");
    let store = NotificationStore::new(Arc::new(client));

    assert_eq!(store.reconcile().await.expect("reconcile"), 2);
    assert_eq!(store.unread_count(), 1);

    let err = store.mark_all_as_read().await.expect_err("server failure");
    match err {
        ClientError::Api { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "database unavailable");
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(store.unread_count(), 1);
    assert!(store.items()[1].read);
}

#[tokio::test]
async fn test_missing_endpoint() {
    let base = serve(MockApi::default()).await;
    let client = ApiClient::with_base_url(format!("{}/v2", base)).expect("client");

    let err = client.list_notifications().await.expect_err("not found");
    assert!(matches!(err, ClientError::NotFound(_)));
}
