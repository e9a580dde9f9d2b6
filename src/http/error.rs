//! Handler-chain errors.
//!
//! A handler that fails returns `ApiError`. Its response carries no body,
//! only a `HandlerFailure` extension; the instrumentation middleware hands
//! that to the error reporter, which renders the client-visible JSON.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Error returned from a handler that should surface its message to the client.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ApiError {
    pub status: Option<StatusCode>,
    pub message: String,
}

impl ApiError {
    /// Error without an explicit status. Reported as 500.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

/// Marker left on a response produced by a failed handler.
#[derive(Debug, Clone)]
pub struct HandlerFailure {
    pub status: Option<StatusCode>,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = self
            .status
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response();
        response.extensions_mut().insert(HandlerFailure {
            status: self.status,
            message: self.message,
        });
        response
    }
}

/// Uniform error payload.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: bool,
    pub message: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
        }
    }
}
