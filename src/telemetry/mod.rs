//! Telemetry subsystem.
//!
//! # Data Flow
//! ```text
//! middleware / handlers
//!     → metrics.rs  (MetricsRegistry → SdkMeterProvider)   ┐
//!     → trace.rs    (Tracer → SdkTracerProvider)           ├→ OTLP/HTTP → backend
//!     → logging.rs  (Logger / tracing → layer fan-out)     ┘
//!                       → sinks.rs (console, remote bridge)
//!
//! provider.rs owns all of the above and drains it on shutdown.
//! ```
//!
//! # Design Decisions
//! - One provider per process, injected rather than looked up globally
//! - Telemetry failures degrade observability, never the request
//! - Exporters are injected, so tests swap in the SDK's in-memory ones

pub mod error;
pub mod logging;
pub mod metrics;
pub mod names;
pub mod propagation;
pub mod provider;
pub mod resource;
pub mod sinks;
pub mod trace;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ExportError, InitError, InstrumentError, ShutdownError, Signal};
pub use logging::{BoxedSink, Logger, Severity};
pub use opentelemetry::KeyValue;
pub use propagation::Propagator;
pub use provider::{BatchConfig, Telemetry, TelemetryBuilder};
pub use sinks::{Console, ConsoleFormat};
pub use self::metrics::{Counter, Gauge, Histogram, InstrumentKind, MetricsRegistry};
pub use trace::{SpanGuard, TraceContext, Tracer};
