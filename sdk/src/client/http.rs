//! HTTP client implementation.
//!
//! [`ApiClient`] talks to the application's notification REST endpoints;
//! [`RelayClient`] calls the relay's trigger endpoints from another
//! service.

use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use printrelay_core::{BroadcastRequest, Notification, NotifyRequest};

use super::config::ClientConfig;
use super::error::ClientError;
use crate::store::NotificationApi;

/// Header carrying the relay trigger key.
pub const RELAY_KEY_HEADER: &str = "X-Relay-Key";

/// Error body returned by the relay and the application API.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Notification list; either a bare array or wrapped in an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NotificationList {
    Bare(Vec<Notification>),
    Wrapped { notifications: Vec<Notification> },
}

impl NotificationList {
    fn into_vec(self) -> Vec<Notification> {
        match self {
            Self::Bare(items) | Self::Wrapped { notifications: items } => items,
        }
    }
}

/// Unread count response.
#[derive(Debug, Deserialize)]
struct CountResponse {
    #[serde(alias = "unreadCount")]
    count: u64,
}

/// Body of `PUT /api/notifications`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MarkReadRequest<'a> {
    action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    notification_id: Option<&'a str>,
}

/// Reply of the relay trigger endpoints.
#[derive(Debug, Deserialize)]
struct DeliveryReply {
    delivered: usize,
}

/// Configured `reqwest` client with retry handling.
#[derive(Debug, Clone)]
struct Http {
    config: ClientConfig,
    http: reqwest::Client,
}

impl Http {
    fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(ref token) = config.auth_token {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, value);
            }
        }

        if let Some(ref key) = config.relay_key {
            if let Ok(value) = HeaderValue::from_str(key) {
                headers.insert(RELAY_KEY_HEADER, value);
            }
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .user_agent(&config.user_agent)
            .build()
            .map_err(ClientError::Request)?;

        Ok(Self { config, http })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.config.url(path);
        self.request_with_retry(path, || self.http.get(&url)).await
    }

    async fn put<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ClientError> {
        let url = self.config.url(path);
        self.request_with_retry(path, || self.http.put(&url).json(body))
            .await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ClientError> {
        let url = self.config.url(path);
        self.request_with_retry(path, || self.http.post(&url).json(body))
            .await
    }

    /// Sends a request, retrying timeouts and 429s up to `max_retries`.
    async fn request_with_retry<T, F>(&self, path: &str, request_fn: F) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut retry_count = 0;

        loop {
            let resp = match request_fn().send().await {
                Ok(resp) => resp,
                Err(e) => {
                    if e.is_timeout() && retry_count < self.config.max_retries {
                        retry_count += 1;
                        tokio::time::sleep(timeout_backoff(retry_count)).await;
                        continue;
                    }
                    return Err(ClientError::from(e));
                }
            };

            let status = resp.status();

            if status.is_success() {
                let body = resp
                    .text()
                    .await
                    .map_err(|e| ClientError::Decode(e.to_string()))?;
                let body = if body.trim().is_empty() { "null" } else { body.as_str() };

                return serde_json::from_str(body)
                    .map_err(|e| ClientError::Decode(e.to_string()));
            }

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                let retry_after = resp
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse().ok());

                if retry_count < self.config.max_retries {
                    tokio::time::sleep(Duration::from_secs(retry_after.unwrap_or(1))).await;
                    retry_count += 1;
                    continue;
                }

                return Err(ClientError::RateLimited { retry_after });
            }

            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(ClientError::NotFound(path.to_string()));
            }

            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(ClientError::Unauthorized);
            }

            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|e| e.error)
                .unwrap_or(body);

            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }
    }
}

/// Client for the application's notification endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Http,
}

impl ApiClient {
    /// Creates a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        Ok(Self {
            http: Http::new(config)?,
        })
    }

    /// Creates a new client with the given base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::new(ClientConfig::new(base_url))
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.http.config
    }

    /// Fetches the authoritative notification list.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_notifications(&self) -> Result<Vec<Notification>, ClientError> {
        let list: NotificationList = self.http.get("/api/notifications").await?;
        Ok(list.into_vec())
    }

    /// Marks one notification as read.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn mark_notification_read(&self, id: &str) -> Result<(), ClientError> {
        let body = MarkReadRequest {
            action: "mark_read",
            notification_id: Some(id),
        };
        let _: serde_json::Value = self.http.put("/api/notifications", &body).await?;
        Ok(())
    }

    /// Marks every notification as read.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn mark_all_notifications_read(&self) -> Result<(), ClientError> {
        let body = MarkReadRequest {
            action: "mark_all_read",
            notification_id: None,
        };
        let _: serde_json::Value = self.http.put("/api/notifications", &body).await?;
        Ok(())
    }

    /// Fetches the server-side unread count.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn unread_count(&self) -> Result<u64, ClientError> {
        let response: CountResponse = self.http.get("/api/notifications/count").await?;
        Ok(response.count)
    }
}

impl NotificationApi for ApiClient {
    fn fetch_notifications(&self) -> BoxFuture<'_, Result<Vec<Notification>, ClientError>> {
        self.list_notifications().boxed()
    }

    fn mark_read<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), ClientError>> {
        self.mark_notification_read(id).boxed()
    }

    fn mark_all_read(&self) -> BoxFuture<'_, Result<(), ClientError>> {
        self.mark_all_notifications_read().boxed()
    }
}

/// Client for the relay's trigger endpoints.
#[derive(Debug, Clone)]
pub struct RelayClient {
    http: Http,
}

impl RelayClient {
    /// Creates a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        Ok(Self {
            http: Http::new(config)?,
        })
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.http.config
    }

    /// Pushes a notification to a user and returns how many connections it
    /// reached.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn deliver(&self, user_id: &str, notification: &Notification) -> Result<usize, ClientError> {
        let body = NotifyRequest {
            user_id: user_id.to_string(),
            notification: notification.clone(),
        };
        let reply: DeliveryReply = self.http.post("/notify", &body).await?;
        Ok(reply.delivered)
    }

    /// Pushes a notification to a user, logging and swallowing failures.
    ///
    /// Returns true when the relay accepted the request, including when the
    /// user is offline.
    pub async fn notify(&self, user_id: &str, notification: &Notification) -> bool {
        match self.deliver(user_id, notification).await {
            Ok(delivered) => {
                debug!(user_id, notification_id = %notification.id, delivered, "relay accepted push");
                true
            }
            Err(e) => {
                warn!(user_id, notification_id = %notification.id, "relay push failed: {}", e);
                false
            }
        }
    }

    /// Pushes a notification to every member of a channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn broadcast(&self, channel: &str, notification: &Notification) -> Result<usize, ClientError> {
        let body = BroadcastRequest {
            channel: channel.to_string(),
            notification: notification.clone(),
        };
        let reply: DeliveryReply = self.http.post("/broadcast", &body).await?;
        Ok(reply.delivered)
    }
}

/// Upper bound on the wait between timed-out attempts.
const MAX_TIMEOUT_BACKOFF: Duration = Duration::from_secs(10);

/// Wait before retry number `retry_count` after a timeout: 200ms doubling,
/// capped at [`MAX_TIMEOUT_BACKOFF`].
fn timeout_backoff(retry_count: u32) -> Duration {
    let factor = 1u64.checked_shl(retry_count).unwrap_or(u64::MAX);
    Duration::from_millis(100u64.saturating_mul(factor)).min(MAX_TIMEOUT_BACKOFF)
}
