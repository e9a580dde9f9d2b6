//! Test doubles and in-memory observation helpers.

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use opentelemetry::logs::AnyValue;
use opentelemetry::{KeyValue, Value};
use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::logs::{InMemoryLogExporter, InMemoryLogExporterBuilder, LogBatch, LogExporter};
use opentelemetry_sdk::metrics::data::{AggregatedMetrics, MetricData};
use opentelemetry_sdk::metrics::InMemoryMetricExporter;
use opentelemetry_sdk::trace::InMemorySpanExporter;
use tracing_subscriber::fmt::MakeWriter;

use super::logging::Severity;
use super::provider::Telemetry;
use super::sinks::{Console, ConsoleFormat};

/// Shared in-memory writer for console output.
#[derive(Clone, Default)]
pub(crate) struct CaptureWriter {
    buf: Arc<Mutex<Vec<u8>>>,
    failing: bool,
}

impl CaptureWriter {
    /// Writer whose every write fails.
    pub(crate) fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub(crate) fn contents(&self) -> String {
        String::from_utf8(self.buf.lock().unwrap().clone()).unwrap()
    }

    /// Every line parsed as JSON.
    pub(crate) fn lines(&self) -> Vec<serde_json::Value> {
        self.contents()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

impl io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.failing {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "console closed"));
        }
        self.buf.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CaptureWriter {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Log exporter that blocks for `delay` on every export.
#[derive(Debug)]
pub(crate) struct SlowLogExporter {
    delay: Duration,
}

impl SlowLogExporter {
    pub(crate) fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl LogExporter for SlowLogExporter {
    fn export(&self, _batch: LogBatch<'_>) -> impl std::future::Future<Output = OTelSdkResult> + Send {
        std::thread::sleep(self.delay);
        std::future::ready(Ok(()))
    }
}

/// One aggregated data point.
#[derive(Debug, Clone)]
pub(crate) struct MetricPoint {
    pub name: String,
    /// Sum, gauge value or histogram sum.
    pub value: f64,
    /// Histogram sample count; 1 for sums and gauges.
    pub count: u64,
    pub attributes: Vec<KeyValue>,
}

impl MetricPoint {
    pub(crate) fn attr(&self, key: &str) -> Option<&Value> {
        self.attributes
            .iter()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| &kv.value)
    }

    pub(crate) fn attr_str(&self, key: &str) -> Option<String> {
        self.attr(key).map(|v| v.as_str().into_owned())
    }

    pub(crate) fn attr_i64(&self, key: &str) -> Option<i64> {
        match self.attr(key) {
            Some(Value::I64(v)) => Some(*v),
            _ => None,
        }
    }
}

/// Data points of `name` in the latest cumulative export.
pub(crate) fn metric_points(exporter: &InMemoryMetricExporter, name: &str) -> Vec<MetricPoint> {
    let finished = exporter.get_finished_metrics().unwrap();
    let Some(latest) = finished.last() else {
        return Vec::new();
    };

    let mut points = Vec::new();
    let point = |value: f64, count: u64, attributes: Vec<KeyValue>| MetricPoint {
        name: name.to_string(),
        value,
        count,
        attributes,
    };
    for metric in latest.scope_metrics().flat_map(|scope| scope.metrics()) {
        if metric.name() != name {
            continue;
        }
        match metric.data() {
            AggregatedMetrics::U64(MetricData::Sum(sum)) => points.extend(
                sum.data_points()
                    .map(|dp| point(dp.value() as f64, 1, dp.attributes().cloned().collect())),
            ),
            AggregatedMetrics::F64(MetricData::Gauge(gauge)) => points.extend(
                gauge
                    .data_points()
                    .map(|dp| point(dp.value(), 1, dp.attributes().cloned().collect())),
            ),
            AggregatedMetrics::F64(MetricData::Histogram(histogram)) => points.extend(
                histogram
                    .data_points()
                    .map(|dp| point(dp.sum(), dp.count(), dp.attributes().cloned().collect())),
            ),
            _ => {}
        }
    }
    points
}

/// Provider wired to in-memory exporters and a captured JSON console.
pub(crate) struct Harness {
    pub telemetry: Telemetry,
    pub logs: InMemoryLogExporter,
    pub metrics: InMemoryMetricExporter,
    pub spans: InMemorySpanExporter,
    pub console: CaptureWriter,
}

pub(crate) fn harness(remote: Severity, console: Severity) -> Harness {
    let logs = InMemoryLogExporterBuilder::default()
        .keep_records_on_shutdown()
        .build();
    let metrics = InMemoryMetricExporter::default();
    let spans = InMemorySpanExporter::default();
    let writer = CaptureWriter::default();
    let telemetry = Telemetry::builder("cart-api", "0.1.0")
        .environment("test")
        .log_exporter(logs.clone())
        .metric_exporter(metrics.clone())
        .span_exporter(spans.clone())
        .remote_log_level(remote)
        .console(Console::writer(writer.clone(), ConsoleFormat::Json, console))
        .build()
        .unwrap();
    Harness {
        telemetry,
        logs,
        metrics,
        spans,
        console: writer,
    }
}

impl Harness {
    pub(crate) async fn flush(&self) {
        self.telemetry.force_flush().await.unwrap();
    }

    pub(crate) fn points(&self, name: &str) -> Vec<MetricPoint> {
        metric_points(&self.metrics, name)
    }

    /// Bodies of every record shipped to the backend, in order.
    pub(crate) fn log_bodies(&self) -> Vec<String> {
        self.logs
            .get_emitted_logs()
            .unwrap()
            .iter()
            .filter_map(|log| match log.record.body() {
                Some(AnyValue::String(body)) => Some(body.to_string()),
                _ => None,
            })
            .collect()
    }
}
