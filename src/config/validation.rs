//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and the telemetry endpoint
//! - Validate value ranges (timeouts > 0, batch sizes)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Log levels are never rejected; they are parsed leniently downstream

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::AppConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check a loaded configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("'{}' is not a socket address", config.server.bind_address),
        ));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "server.request_timeout_secs",
            "must be greater than 0",
        ));
    }

    let telemetry = &config.telemetry;
    match Url::parse(&telemetry.endpoint) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError::new(
            "telemetry.endpoint",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("telemetry.endpoint", e.to_string())),
    }
    if telemetry.export_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "telemetry.export_timeout_secs",
            "must be greater than 0",
        ));
    }
    if telemetry.api_key_header.trim().is_empty() {
        errors.push(ValidationError::new(
            "telemetry.api_key_header",
            "must not be empty",
        ));
    }

    let batch = &telemetry.batch;
    if batch.max_queue_size == 0 {
        errors.push(ValidationError::new(
            "telemetry.batch.max_queue_size",
            "must be greater than 0",
        ));
    }
    if batch.max_export_batch_size == 0 {
        errors.push(ValidationError::new(
            "telemetry.batch.max_export_batch_size",
            "must be greater than 0",
        ));
    } else if batch.max_export_batch_size > batch.max_queue_size {
        errors.push(ValidationError::new(
            "telemetry.batch.max_export_batch_size",
            "must not exceed max_queue_size",
        ));
    }
    if batch.scheduled_delay_ms == 0 {
        errors.push(ValidationError::new(
            "telemetry.batch.scheduled_delay_ms",
            "must be greater than 0",
        ));
    }

    if telemetry.prometheus_enabled && telemetry.prometheus_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "telemetry.prometheus_address",
            format!("'{}' is not a socket address", telemetry.prometheus_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
