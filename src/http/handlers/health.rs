//! Health and intentional-error endpoints.

use axum::extract::State;
use axum::Json;
use chrono::Utc;

use crate::cart::HealthResponse;
use crate::http::error::ApiError;
use crate::http::middleware::RequestTrace;
use crate::http::server::AppState;
use crate::telemetry::{names, KeyValue};

pub async fn get_health(
    State(state): State<AppState>,
    RequestTrace(context): RequestTrace,
) -> Json<HealthResponse> {
    state.telemetry.metrics().record_counter(
        names::HEALTH_CHECKS_TOTAL,
        1,
        &[
            KeyValue::new("endpoint", "health"),
            KeyValue::new("status", "ok"),
        ],
    );
    state
        .telemetry
        .logger()
        .in_context(&context, || tracing::info!("Health check endpoint called"));

    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Server is running".to_string(),
        timestamp: Utc::now(),
    })
}

/// Always fails. Used to exercise the error path end to end.
pub async fn get_error(
    State(state): State<AppState>,
    RequestTrace(context): RequestTrace,
) -> Result<Json<HealthResponse>, ApiError> {
    state.telemetry.metrics().record_counter(
        names::INTENTIONAL_ERRORS_TOTAL,
        1,
        &[
            KeyValue::new("endpoint", "error"),
            KeyValue::new("type", "intentional_error"),
        ],
    );
    // The reporter writes the single error-level line for this request.
    state
        .telemetry
        .logger()
        .in_context(&context, || tracing::debug!("Error endpoint called"));

    Err(ApiError::new("This endpoint always returns an error"))
}
