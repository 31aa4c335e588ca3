//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how it is
//! rendered into the uniform error envelope.

use crate::{config::ConfigError, web::protocol::ErrorEnvelope};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use forum_answers_core::ports::PortError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error(transparent)]
    Port(#[from] PortError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl ApiError {
    /// The stable category name, HTTP status and retry hint for this error.
    fn parts(&self) -> (&'static str, StatusCode, bool) {
        match self {
            ApiError::Port(e) => {
                let category = e.category();
                let status = StatusCode::from_u16(category.http_status())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (category.as_str(), status, category.retryable())
            }
            _ => ("internal", StatusCode::INTERNAL_SERVER_ERROR, false),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (category, status, retryable) = self.parts();
        let message = match &self {
            ApiError::Port(e) => e.to_string(),
            // Configuration and I/O details stay in the logs.
            _ => "Internal server error".to_string(),
        };

        (status, Json(ErrorEnvelope::new(category, message, retryable))).into_response()
    }
}
