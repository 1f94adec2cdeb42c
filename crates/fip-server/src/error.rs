//! API error types for the feedback-intelligence pipeline server.
//!
//! Maps core domain errors to HTTP status codes and JSON error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fip_core::error::{IngressError, QueueError, StorageError};
use serde_json::json;

/// API error type for route handlers.
pub enum ApiError {
    /// Internal storage/database error.
    Storage(StorageError),
    /// Broker/queue error.
    Queue(QueueError),
    /// Bad request (failed ingress validation).
    BadRequest(String),
    /// Conflict (resource already exists, etc.).
    Conflict(String),
}

impl From<IngressError> for ApiError {
    fn from(err: IngressError) -> Self {
        match err {
            IngressError::Validation(e) => Self::BadRequest(e.to_string()),
            IngressError::Storage(e) => Self::Storage(e),
            IngressError::Queue(e) => Self::Queue(e),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        Self::Queue(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Storage(e) => {
                tracing::error!(error = %e, "storage error");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            Self::Queue(e) => {
                tracing::error!(error = %e, "queue error");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = axum::Json(json!({ "error": message }));
        (status, body).into_response()
    }
}
