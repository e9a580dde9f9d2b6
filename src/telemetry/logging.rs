//! Log fan-out pipeline.
//!
//! # Data Flow
//! ```text
//! tracing event (inside Logger::in_context or via the global subscriber)
//!     → Registry
//!         → [remote floor]  OpenTelemetryTracingBridge → BatchLogProcessor
//!         → [console floor] fmt layer → stdout
//! ```
//!
//! # Design Decisions
//! - Each destination is a `tracing_subscriber` layer with its own filter; the
//!   layer list is the fan-out and is fixed once the provider is built
//! - A record is enabled if any destination's filter admits it
//! - Layers see the event by reference, so no destination can alter another's view
//! - Events are linked to spans through the attached OpenTelemetry context

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{Dispatch, Level};
use tracing_subscriber::filter::{filter_fn, FilterExt};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use super::error::InitError;
use super::trace::TraceContext;

/// One log destination, already wrapped in its filter.
pub type BoxedSink = Box<dyn Layer<Registry> + Send + Sync>;

/// Log severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

impl Severity {
    /// Parse a level name. Case-insensitive, `warning` means `warn`,
    /// anything unrecognized is `Info`.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "debug" => Severity::Debug,
            "info" => Severity::Info,
            "warn" | "warning" => Severity::Warn,
            "error" => Severity::Error,
            _ => Severity::Info,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }

    /// Filter directive admitting this severity and above.
    pub const fn directive(self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Level> for Severity {
    fn from(level: Level) -> Self {
        match level {
            Level::ERROR => Severity::Error,
            Level::WARN => Severity::Warn,
            Level::INFO => Severity::Info,
            _ => Severity::Debug,
        }
    }
}

/// Wrap `layer` in a filter built from `directives`, silenced once
/// `shut_down` is set.
pub(crate) fn filtered<L>(
    layer: L,
    directives: &str,
    shut_down: Arc<AtomicBool>,
) -> Result<BoxedSink, InitError>
where
    L: Layer<Registry> + Send + Sync + 'static,
{
    let env = EnvFilter::try_new(directives).map_err(|e| InitError::Subscriber(e.to_string()))?;
    let open = filter_fn(move |_| !shut_down.load(Ordering::Acquire));
    Ok(layer.with_filter(env.and(open)).boxed())
}

/// Join the destinations into one dispatcher.
pub(crate) fn fan_out(sinks: Vec<BoxedSink>) -> Dispatch {
    Dispatch::new(tracing_subscriber::registry().with(sinks))
}

/// Request-scoped logging handle injected into components.
///
/// Events emitted inside [`Logger::in_context`] reach every destination and
/// carry the trace linkage of the given context.
#[derive(Clone)]
pub struct Logger {
    dispatch: Dispatch,
    shut_down: Arc<AtomicBool>,
}

impl Logger {
    pub(crate) fn new(dispatch: Dispatch, shut_down: Arc<AtomicBool>) -> Self {
        Self {
            dispatch,
            shut_down,
        }
    }

    pub(crate) fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Whether any destination would accept an event at `level`.
    pub fn enabled(&self, level: Severity) -> bool {
        if self.shut_down.load(Ordering::Acquire) {
            return false;
        }
        tracing::dispatcher::with_default(&self.dispatch, || match level {
            Severity::Debug => tracing::enabled!(Level::DEBUG),
            Severity::Info => tracing::enabled!(Level::INFO),
            Severity::Warn => tracing::enabled!(Level::WARN),
            Severity::Error => tracing::enabled!(Level::ERROR),
        })
    }

    /// Run `emit` with this pipeline as the active subscriber and `context`
    /// as the current OpenTelemetry context.
    pub fn in_context(&self, context: &TraceContext, emit: impl FnOnce()) {
        if self.shut_down.load(Ordering::Acquire) {
            return;
        }
        let _attached = context.context().clone().attach();
        tracing::dispatcher::with_default(&self.dispatch, emit);
    }
}
