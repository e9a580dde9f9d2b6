//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::telemetry::ConsoleFormat;

/// Root configuration for the cart service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server settings.
    pub server: ServerConfig,

    /// Telemetry provider settings.
    pub telemetry: TelemetryConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Deployment environment reported as `deployment.environment`.
    pub environment: String,

    /// Minimum severity shipped to the backend (debug, info, warn, error).
    pub log_level: String,

    /// Minimum severity printed locally. Falls back to `log_level`.
    pub console_log_level: Option<String>,

    /// Console line format.
    pub console_format: ConsoleFormat,

    /// Telemetry backend base URL.
    pub endpoint: String,

    /// Optional ingestion key sent with every export.
    pub api_key: Option<String>,

    /// Header carrying `api_key`.
    pub api_key_header: String,

    /// Upper bound for a single export call in seconds.
    pub export_timeout_secs: u64,

    /// Batching for all three pipelines.
    pub batch: BatchSettings,

    /// Serve a local Prometheus scrape endpoint.
    pub prometheus_enabled: bool,

    /// Scrape endpoint bind address.
    pub prometheus_address: String,

    /// Install the log pipeline as the global `tracing` subscriber.
    pub install_global_subscriber: bool,
}

impl TelemetryConfig {
    pub fn effective_console_level(&self) -> &str {
        self.console_log_level.as_deref().unwrap_or(&self.log_level)
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            log_level: "info".to_string(),
            console_log_level: None,
            console_format: ConsoleFormat::Text,
            endpoint: "http://localhost:4318".to_string(),
            api_key: None,
            api_key_header: "signoz-ingestion-key".to_string(),
            export_timeout_secs: 10,
            batch: BatchSettings::default(),
            prometheus_enabled: false,
            prometheus_address: "0.0.0.0:9090".to_string(),
            install_global_subscriber: true,
        }
    }
}

/// Export batching parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Items buffered per pipeline before new ones are dropped.
    pub max_queue_size: usize,

    /// Items per export call.
    pub max_export_batch_size: usize,

    /// Delay between scheduled exports in milliseconds.
    pub scheduled_delay_ms: u64,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_queue_size: 2048,
            max_export_batch_size: 512,
            scheduled_delay_ms: 1000,
        }
    }
}
