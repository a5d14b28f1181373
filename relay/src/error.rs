//! Relay error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::config::ConfigError;

/// Relay errors.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Binding or serving failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Trigger endpoint called without the configured key.
    #[error("unauthorized")]
    Unauthorized,

    /// Trigger request body could not be decoded.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

impl RelayError {
    /// Returns the HTTP status for the error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            Self::Config(_) | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
