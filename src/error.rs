//! Error handling for bulb-sentinel

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Device cannot be opened (absent, busy, permission denied, unsupported)
    #[error("Device unavailable: {device_id}: {reason}")]
    DeviceUnavailable { device_id: String, reason: String },

    /// No frame arrived within the bounded wait
    #[error("Capture timeout on {device_id} after {waited_ms} ms")]
    CaptureTimeout { device_id: String, waited_ms: u64 },

    /// Capture called on a released session
    #[error("Session closed: {0}")]
    SessionClosed(String),

    /// Backend reported a broken stream
    #[error("Capture failed: {0}")]
    Capture(String),

    /// Monitoring already active
    #[error("Already running: {0}")]
    AlreadyRunning(String),

    /// Monitoring not active
    #[error("Not running")]
    NotRunning,

    /// Config error
    #[error("Config error: {0}")]
    Config(String),

    /// Image codec error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn device_unavailable(device_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::DeviceUnavailable {
            device_id: device_id.into(),
            reason: reason.into(),
        }
    }

    /// Short machine-readable code, shared by HTTP responses and monitor state
    pub fn code(&self) -> &'static str {
        match self {
            Error::DeviceUnavailable { .. } => "DEVICE_UNAVAILABLE",
            Error::CaptureTimeout { .. } => "CAPTURE_TIMEOUT",
            Error::SessionClosed(_) => "SESSION_CLOSED",
            Error::Capture(_) => "CAPTURE_FAILED",
            Error::AlreadyRunning(_) => "ALREADY_RUNNING",
            Error::NotRunning => "NOT_RUNNING",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Image(_) => "IMAGE_ERROR",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Transient errors may be retried a bounded number of times
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::CaptureTimeout { .. })
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::DeviceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::CaptureTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Error::SessionClosed(_) => StatusCode::CONFLICT,
            Error::Capture(_) => StatusCode::BAD_GATEWAY,
            Error::AlreadyRunning(_) => StatusCode::CONFLICT,
            Error::NotRunning => StatusCode::CONFLICT,
            Error::Config(_) => StatusCode::BAD_REQUEST,
            Error::Image(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Serialization(_) | Error::Io(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let error_code = self.code();
        let message = self.to_string();

        tracing::error!(
            status = %status,
            error_code = %error_code,
            message = %message,
            "Request error"
        );

        let body = Json(json!({
            "error_code": error_code,
            "message": message
        }));

        (status, body).into_response()
    }
}
