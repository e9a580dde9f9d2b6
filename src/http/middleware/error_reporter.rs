//! Structured error reporter.
//!
//! The only place a handler's own error message is written to the client.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::http::error::{ErrorBody, HandlerFailure};
use crate::telemetry::{names, KeyValue, Telemetry, TraceContext};

use super::instrumentation::RequestMeta;

#[derive(Clone)]
pub struct ErrorReporter {
    telemetry: Arc<Telemetry>,
}

impl ErrorReporter {
    pub fn new(telemetry: Arc<Telemetry>) -> Self {
        Self { telemetry }
    }

    /// Render `failure` as `{error: true, message}` and record it.
    pub fn handle_error(
        &self,
        meta: &RequestMeta,
        context: &TraceContext,
        failure: &HandlerFailure,
    ) -> Response {
        let status = failure.status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        self.telemetry.metrics().record_counter(
            names::ERRORS_TOTAL,
            1,
            &[
                KeyValue::new("method", meta.method.clone()),
                KeyValue::new("path", meta.path.clone()),
                KeyValue::new("status", i64::from(status.as_u16())),
                KeyValue::new("type", "application_error"),
            ],
        );

        self.telemetry.logger().in_context(context, || {
            tracing::error!(
                method = %meta.method,
                path = %meta.path,
                status = status.as_u16(),
                ip = %meta.client_ip,
                "Request error: {}",
                failure.message
            );
        });

        (status, Json(ErrorBody::new(failure.message.clone()))).into_response()
    }
}
