use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or invalid line name, malformed configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A physical line is already held by another button
    #[error("Resource busy: {0}")]
    ResourceBusy(String),

    /// Wait/read/request failure on a button line
    #[error("Hardware I/O error [{line}]: {reason}")]
    HardwareIo { line: String, reason: String },

    /// A peer object, service or property could not be found on the bus
    #[error("Lookup failed: {0}")]
    Lookup(String),

    /// Transport-level failure of a bus call
    #[error("Bus error: {0}")]
    Bus(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Shorthand for a hardware error on a named line
    pub fn hardware(line: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::HardwareIo {
            line: line.into(),
            reason: reason.to_string(),
        }
    }
}

/// Error response body (unified success format)
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Lookup(_) | Self::Bus(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            success: false,
            message: self.to_string(),
        };

        tracing::error!(
            error_type = std::any::type_name_of_val(&self),
            error_message = %body.message,
            "Request failed"
        );

        (status, Json(body)).into_response()
    }
}

/// Result type alias used across the crate
pub type Result<T> = std::result::Result<T, AppError>;
