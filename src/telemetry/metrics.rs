//! Metric instrument registry.
//!
//! # Responsibilities
//! - Resolve a metric name to one long-lived handle per (name, kind)
//! - Record through OpenTelemetry instruments on the provider's meter
//! - Mirror measurements into the `metrics` facade when a local scrape endpoint runs
//!
//! # Design Decisions
//! - Creation goes through `DashMap::entry`, so racing resolvers of an
//!   unknown name end up with the same handle
//! - Resolution failures are logged and the measurement is dropped; recording
//!   never fails a request
//! - After shutdown every record call is a silent no-op

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use opentelemetry::metrics::Meter;
use opentelemetry::KeyValue;
use serde::Serialize;

use super::error::InstrumentError;

const MAX_NAME_LEN: usize = 255;

/// Latency buckets in seconds.
const DURATION_BOUNDARIES: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentKind {
    Counter,
    Histogram,
    Gauge,
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstrumentKind::Counter => "counter",
            InstrumentKind::Histogram => "histogram",
            InstrumentKind::Gauge => "gauge",
        };
        f.write_str(s)
    }
}

enum Instrument {
    Counter(opentelemetry::metrics::Counter<u64>),
    Histogram(opentelemetry::metrics::Histogram<f64>),
    Gauge(opentelemetry::metrics::Gauge<f64>),
}

struct InstrumentCore {
    name: String,
    kind: InstrumentKind,
    instrument: Instrument,
    mirror: bool,
    shut_down: Arc<AtomicBool>,
}

impl InstrumentCore {
    fn emit(&self, value: f64, attributes: &[KeyValue]) {
        if self.shut_down.load(Ordering::Acquire) {
            return;
        }
        if self.mirror {
            self.mirror(value, attributes);
        }
        match &self.instrument {
            Instrument::Counter(counter) => counter.add(value as u64, attributes),
            Instrument::Histogram(histogram) => histogram.record(value, attributes),
            Instrument::Gauge(gauge) => gauge.record(value, attributes),
        }
    }

    fn mirror(&self, value: f64, attributes: &[KeyValue]) {
        let labels: Vec<::metrics::Label> = attributes
            .iter()
            .map(|kv| ::metrics::Label::new(kv.key.to_string(), kv.value.to_string()))
            .collect();
        match self.kind {
            InstrumentKind::Counter => {
                ::metrics::counter!(self.name.clone(), labels).increment(value as u64)
            }
            InstrumentKind::Histogram => ::metrics::histogram!(self.name.clone(), labels).record(value),
            InstrumentKind::Gauge => ::metrics::gauge!(self.name.clone(), labels).set(value),
        }
    }
}

macro_rules! instrument_handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone)]
        pub struct $name(Arc<InstrumentCore>);

        impl $name {
            pub fn name(&self) -> &str {
                &self.0.name
            }

            /// True when both handles refer to the same instrument.
            pub fn ptr_eq(&self, other: &Self) -> bool {
                Arc::ptr_eq(&self.0, &other.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.0.name).finish()
            }
        }
    };
}

instrument_handle!(
    /// Monotonic counter.
    Counter
);
instrument_handle!(
    /// Distribution of recorded values.
    Histogram
);
instrument_handle!(
    /// Last-value sample.
    Gauge
);

impl Counter {
    pub fn add(&self, delta: u64, attributes: &[KeyValue]) {
        self.0.emit(delta as f64, attributes);
    }
}

impl Histogram {
    pub fn record(&self, value: f64, attributes: &[KeyValue]) {
        self.0.emit(value, attributes);
    }
}

impl Gauge {
    pub fn record(&self, value: f64, attributes: &[KeyValue]) {
        self.0.emit(value, attributes);
    }
}

/// Cache of instrument handles owned by the provider.
pub struct MetricsRegistry {
    meter: Meter,
    instruments: DashMap<(String, InstrumentKind), Arc<InstrumentCore>>,
    mirror: bool,
    shut_down: Arc<AtomicBool>,
}

impl MetricsRegistry {
    pub(crate) fn new(meter: Meter, mirror: bool, shut_down: Arc<AtomicBool>) -> Self {
        Self {
            meter,
            instruments: DashMap::new(),
            mirror,
            shut_down,
        }
    }

    pub fn counter(&self, name: &str) -> Result<Counter, InstrumentError> {
        self.resolve(name, InstrumentKind::Counter).map(Counter)
    }

    pub fn histogram(&self, name: &str) -> Result<Histogram, InstrumentError> {
        self.resolve(name, InstrumentKind::Histogram).map(Histogram)
    }

    pub fn gauge(&self, name: &str) -> Result<Gauge, InstrumentError> {
        self.resolve(name, InstrumentKind::Gauge).map(Gauge)
    }

    pub fn record_counter(&self, name: &str, delta: u64, attributes: &[KeyValue]) {
        if let Some(counter) = self.lookup(name, InstrumentKind::Counter) {
            Counter(counter).add(delta, attributes);
        }
    }

    pub fn record_histogram(&self, name: &str, value: f64, attributes: &[KeyValue]) {
        if let Some(histogram) = self.lookup(name, InstrumentKind::Histogram) {
            Histogram(histogram).record(value, attributes);
        }
    }

    pub fn record_gauge(&self, name: &str, value: f64, attributes: &[KeyValue]) {
        if let Some(gauge) = self.lookup(name, InstrumentKind::Gauge) {
            Gauge(gauge).record(value, attributes);
        }
    }

    /// Number of cached instruments.
    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    pub(crate) fn precreate(&self, names: &[(&str, InstrumentKind)]) -> Result<(), InstrumentError> {
        for (name, kind) in names {
            self.resolve(name, *kind)?;
        }
        Ok(())
    }

    fn lookup(&self, name: &str, kind: InstrumentKind) -> Option<Arc<InstrumentCore>> {
        match self.resolve(name, kind) {
            Ok(core) => Some(core),
            Err(InstrumentError::Shutdown) => None,
            Err(e) => {
                tracing::warn!(metric = %name, kind = %kind, error = %e, "Failed to create instrument, measurement dropped");
                None
            }
        }
    }

    fn resolve(&self, name: &str, kind: InstrumentKind) -> Result<Arc<InstrumentCore>, InstrumentError> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(InstrumentError::Shutdown);
        }

        let key = (name.to_string(), kind);
        if let Some(core) = self.instruments.get(&key) {
            return Ok(core.clone());
        }

        validate_name(name)?;
        let core = self
            .instruments
            .entry(key)
            .or_insert_with(|| {
                Arc::new(InstrumentCore {
                    name: name.to_string(),
                    kind,
                    instrument: self.build(name, kind),
                    mirror: self.mirror,
                    shut_down: self.shut_down.clone(),
                })
            })
            .clone();
        Ok(core)
    }

    fn build(&self, name: &str, kind: InstrumentKind) -> Instrument {
        let name = name.to_string();
        match kind {
            InstrumentKind::Counter => Instrument::Counter(self.meter.u64_counter(name).build()),
            InstrumentKind::Histogram => {
                let builder = self.meter.f64_histogram(name.clone());
                let builder = if name.ends_with(".seconds") {
                    builder.with_unit("s").with_boundaries(DURATION_BOUNDARIES.to_vec())
                } else {
                    builder
                };
                Instrument::Histogram(builder.build())
            }
            InstrumentKind::Gauge => Instrument::Gauge(self.meter.f64_gauge(name).build()),
        }
    }
}

fn validate_name(name: &str) -> Result<(), InstrumentError> {
    let mut chars = name.chars();
    let starts_alpha = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/'));
    if !starts_alpha || !rest_ok || name.len() > MAX_NAME_LEN {
        return Err(InstrumentError::InvalidName(name.to_string()));
    }
    Ok(())
}
