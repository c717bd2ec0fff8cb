//! Error handling module
//!
//! Internal relay errors and the single `ErrorWithStatusCode` shape that
//! crosses the adaptor boundary

use crate::models::ApiError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Fixed message for undecodable upstream bodies; parser internals stay in logs
pub const DECODE_ERROR_MESSAGE: &str = "failed to decode upstream response";

/// Relay error types
#[derive(Error, Debug)]
pub enum RelayError {
    /// Missing/invalid channel settings, unregistered channel type
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed canonical request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// DNS/TLS/timeout/connection failures
    #[error("Upstream transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Vendor answered with an error
    #[error("Upstream error ({status}): {}", .error.message)]
    Upstream { status: u16, error: ApiError },

    /// Vendor body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Vendor succeeded but produced nothing usable
    #[error("No content generated: {0}")]
    NoContent(String),

    /// Mid-stream read/write failure
    #[error("Stream error: {0}")]
    Stream(String),
}

impl RelayError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            RelayError::Config(_) => 500,
            RelayError::InvalidRequest(_) => 400,
            RelayError::Transport(e) if e.is_timeout() => 504,
            RelayError::Transport(_) => 502,
            RelayError::Upstream { status, .. } => *status,
            RelayError::Decode(_) => 500,
            RelayError::NoContent(_) => 502,
            RelayError::Stream(_) => 500,
        }
    }

    /// Get error type string
    pub fn error_type(&self) -> &'static str {
        match self {
            RelayError::Config(_) => "configuration_error",
            RelayError::InvalidRequest(_) => "invalid_request_error",
            RelayError::Transport(_) => "transport_error",
            RelayError::Upstream { .. } => "upstream_error",
            RelayError::Decode(_) => "decode_error",
            RelayError::NoContent(_) => "no_content_error",
            RelayError::Stream(_) => "stream_error",
        }
    }

    /// Get error code string
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::Config(_) => "invalid_config",
            RelayError::InvalidRequest(_) => "invalid_request",
            RelayError::Transport(_) => "do_request_failed",
            RelayError::Upstream { .. } => "bad_response_status_code",
            RelayError::Decode(_) => "decode_response_failed",
            RelayError::NoContent(_) => "no_content_generated",
            RelayError::Stream(_) => "stream_failed",
        }
    }

    /// Whether detailed error information should be logged
    pub fn should_log_details(&self) -> bool {
        !matches!(self, RelayError::InvalidRequest(_) | RelayError::Upstream { .. })
    }
}

/// Result type alias for internal relay code
pub type RelayResult<T> = Result<T, RelayError>;

/// The error shape surfaced to the original caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorWithStatusCode {
    /// HTTP status to surface
    #[serde(skip)]
    pub status_code: u16,
    pub error: ApiError,
}

impl ErrorWithStatusCode {
    pub fn new(status_code: u16, error: ApiError) -> Self {
        Self { status_code, error }
    }
}

impl std::fmt::Display for ErrorWithStatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "status {}: {}", self.status_code, self.error.message)
    }
}

impl std::error::Error for ErrorWithStatusCode {}

impl From<RelayError> for ErrorWithStatusCode {
    fn from(err: RelayError) -> Self {
        if err.should_log_details() {
            tracing::error!("Relay error: {} - Status code: {}", err, err.status_code());
        } else {
            tracing::warn!("Relay error: {} - Status code: {}", err.error_type(), err.status_code());
        }

        let status_code = err.status_code();
        let error = match err {
            RelayError::Upstream { error, .. } => {
                let message = if error.message.is_empty() {
                    format!("bad response status code {}", status_code)
                } else {
                    error.message
                };
                ApiError {
                    message,
                    error_type: if error.error_type.is_empty() {
                        "upstream_error".to_string()
                    } else {
                        error.error_type
                    },
                    code: error.code.or_else(|| Some(Value::from(status_code))),
                }
            }
            RelayError::Decode(_) => ApiError::new(DECODE_ERROR_MESSAGE, err.error_type(), err.code()),
            other => ApiError::new(other.to_string(), other.error_type(), other.code()),
        };

        ErrorWithStatusCode { status_code, error }
    }
}

/// Implement IntoResponse so handlers can return the boundary error directly
impl IntoResponse for ErrorWithStatusCode {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// Error handling helper functions
pub mod helpers {
    use super::*;

    /// Create configuration error
    pub fn config_error(message: impl Into<String>) -> RelayError {
        RelayError::Config(message.into())
    }

    /// Create invalid request error
    pub fn invalid_request(message: impl Into<String>) -> RelayError {
        RelayError::InvalidRequest(message.into())
    }

    /// Create error for a vendor-reported failure
    pub fn upstream_error(status: u16, error: ApiError) -> RelayError {
        RelayError::Upstream { status, error }
    }

    /// Create stream error
    pub fn stream_error(message: impl Into<String>) -> RelayError {
        RelayError::Stream(message.into())
    }
}

/// Error context extension trait
pub trait ErrorContext<T> {
    /// Add configuration error context
    fn config_context(self, message: &str) -> RelayResult<T>;

    /// Add decode error context
    fn decode_context(self, message: &str) -> RelayResult<T>;

    /// Add stream error context
    fn stream_context(self, message: &str) -> RelayResult<T>;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn config_context(self, message: &str) -> RelayResult<T> {
        self.map_err(|e| RelayError::Config(format!("{}: {}", message, e)))
    }

    fn decode_context(self, message: &str) -> RelayResult<T> {
        self.map_err(|e| RelayError::Decode(format!("{}: {}", message, e)))
    }

    fn stream_context(self, message: &str) -> RelayResult<T> {
        self.map_err(|e| RelayError::Stream(format!("{}: {}", message, e)))
    }
}
