//! Log destinations.
//!
//! # Responsibilities
//! - `Console`: one line per event on a local writer, text or JSON
//! - `remote`: bridge events into the OpenTelemetry log pipeline
//!
//! Both return a [`BoxedSink`] carrying its own floor.

use std::str::FromStr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use serde::{Deserialize, Serialize};
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use super::error::InitError;
use super::logging::{filtered, BoxedSink, Severity};

/// Local filter tail. HTTP client internals stay at `warn`.
const CONSOLE_QUIET: &str = "hyper=warn,hyper_util=warn,h2=warn,reqwest=warn,tower=warn";

/// Remote filter tail. The export path must never feed its own queue.
const REMOTE_QUIET: &str = "opentelemetry=off,opentelemetry_sdk=off,opentelemetry_otlp=off,\
opentelemetry_http=off,hyper=off,hyper_util=off,h2=off,reqwest=off,tower=off";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for ConsoleFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(ConsoleFormat::Text),
            "json" => Ok(ConsoleFormat::Json),
            other => Err(format!("unknown console format '{}'", other)),
        }
    }
}

/// Console destination settings.
pub struct Console {
    format: ConsoleFormat,
    level: Severity,
    writer: BoxMakeWriter,
    ansi: bool,
    honor_env: bool,
}

impl Console {
    /// Stdout at `level`. `RUST_LOG`, when set, overrides the floor.
    pub fn stdout(format: ConsoleFormat, level: Severity) -> Self {
        Self {
            format,
            level,
            writer: BoxMakeWriter::new(std::io::stdout),
            ansi: true,
            honor_env: true,
        }
    }

    /// Any writer at `level`. Colors are off and `RUST_LOG` is ignored.
    pub fn writer<W>(writer: W, format: ConsoleFormat, level: Severity) -> Self
    where
        W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
    {
        Self {
            format,
            level,
            writer: BoxMakeWriter::new(writer),
            ansi: false,
            honor_env: false,
        }
    }

    pub fn level(&self) -> Severity {
        self.level
    }

    fn directives(&self) -> String {
        if self.honor_env {
            if let Ok(env) = std::env::var("RUST_LOG") {
                if !env.trim().is_empty() {
                    return env;
                }
            }
        }
        format!("{},{}", self.level.directive(), CONSOLE_QUIET)
    }

    pub(crate) fn into_sink(self, shut_down: Arc<AtomicBool>) -> Result<BoxedSink, InitError> {
        let directives = self.directives();
        let layer = fmt::layer().with_ansi(self.ansi).with_writer(self.writer);
        match self.format {
            ConsoleFormat::Text => filtered(layer, &directives, shut_down),
            ConsoleFormat::Json => filtered(layer.json().flatten_event(true), &directives, shut_down),
        }
    }
}

/// Destination shipping events to the backend through `provider`.
pub(crate) fn remote(
    provider: &SdkLoggerProvider,
    level: Severity,
    shut_down: Arc<AtomicBool>,
) -> Result<BoxedSink, InitError> {
    let directives = format!("{},{}", level.directive(), REMOTE_QUIET);
    filtered(OpenTelemetryTracingBridge::new(provider), &directives, shut_down)
}
