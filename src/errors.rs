use crate::services::{gateway_service::GatewayError, provider::ProviderError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 502 Bad Gateway
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "message": self.message,
        }));

        (self.status, body).into_response()
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Validation(msg) => AppError::bad_request(msg),
            GatewayError::UploadFailed => {
                AppError::upstream(GatewayError::UploadFailed.to_string())
            }
            GatewayError::Provider(ProviderError::NotFound(msg)) => AppError::not_found(msg),
            GatewayError::Provider(ProviderError::Io(io_err)) => {
                tracing::error!(error = %io_err, "provider could not read staged file");
                AppError::internal("internal error")
            }
            GatewayError::Provider(ProviderError::Rejected { status, message }) => {
                tracing::warn!(status, "provider rejected request: {}", message);
                AppError::upstream(message)
            }
            GatewayError::Provider(other) => AppError::upstream(other.to_string()),
            GatewayError::Io(io_err) => {
                tracing::error!(error = %io_err, "local I/O failure");
                AppError::internal("internal error")
            }
        }
    }
}
