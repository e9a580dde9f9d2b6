//! Telemetry error types.

use std::fmt;

use opentelemetry_otlp::ExporterBuildError;
use opentelemetry_sdk::error::OTelSdkError;
use thiserror::Error;

/// One of the three telemetry signals, each with its own export pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Logs,
    Metrics,
    Traces,
}

impl Signal {
    /// OTLP/HTTP path segment for this signal.
    pub const fn as_str(self) -> &'static str {
        match self {
            Signal::Logs => "logs",
            Signal::Metrics => "metrics",
            Signal::Traces => "traces",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that abort provider construction.
///
/// Any of these is fatal to process startup.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("invalid resource: {0}")]
    InvalidResource(String),

    #[error("invalid telemetry endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("no exporter configured for {0} pipeline")]
    MissingExporter(Signal),

    #[error("failed to build {signal} exporter: {source}")]
    Exporter {
        signal: Signal,
        #[source]
        source: ExporterBuildError,
    },

    #[error("failed to install global log subscriber: {0}")]
    Subscriber(String),

    #[error("failed to install prometheus exporter: {0}")]
    Prometheus(String),
}

/// Failure while flushing one pipeline.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("{signal} pipeline failed to flush: {source}")]
    Pipeline {
        signal: Signal,
        #[source]
        source: OTelSdkError,
    },

    #[error("{signal} flush task did not complete")]
    Aborted { signal: Signal },
}

/// Failure to resolve a metric instrument.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InstrumentError {
    #[error("invalid instrument name '{0}'")]
    InvalidName(String),

    #[error("metrics pipeline is shut down")]
    Shutdown,
}

/// Failure reported by [`Telemetry::shutdown`](super::Telemetry::shutdown).
#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("telemetry already shut down")]
    AlreadyShutdown,

    #[error("{signal} pipeline shutdown failed: {source}")]
    Stage {
        signal: Signal,
        #[source]
        source: OTelSdkError,
    },

    #[error("{signal} pipeline did not drain before the deadline")]
    DeadlineExceeded { signal: Signal },

    #[error("{signal} shutdown task did not complete")]
    Aborted { signal: Signal },
}
