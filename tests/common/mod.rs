//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use opentelemetry::logs::AnyValue;
use opentelemetry::trace::Event;
use opentelemetry::{KeyValue, Value};
use opentelemetry_sdk::logs::{InMemoryLogExporter, InMemoryLogExporterBuilder, SdkLogRecord};
use opentelemetry_sdk::metrics::data::{AggregatedMetrics, MetricData};
use opentelemetry_sdk::metrics::InMemoryMetricExporter;
use opentelemetry_sdk::trace::{InMemorySpanExporter, SpanData};
use serde_json::Value as Json;
use tower::ServiceExt;
use tracing_subscriber::fmt::MakeWriter;

use cart_api::config::ServerConfig;
use cart_api::telemetry::{BatchConfig, Console, ConsoleFormat, Severity, Telemetry};
use cart_api::HttpServer;

/// Console output captured in memory.
#[derive(Clone, Default)]
pub struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl CaptureWriter {
    /// Every console line parsed as JSON.
    pub fn lines(&self) -> Vec<Json> {
        String::from_utf8(self.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

impl io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
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

/// One aggregated data point from the latest cumulative export.
#[derive(Debug, Clone)]
pub struct MetricPoint {
    pub name: String,
    /// Sum, gauge value or histogram sum.
    pub value: f64,
    /// Histogram sample count; 1 for sums and gauges.
    pub count: u64,
    pub attributes: Vec<KeyValue>,
}

/// A server wired to in-memory exporters.
pub struct TestApp {
    pub telemetry: Arc<Telemetry>,
    pub server: HttpServer,
    pub logs: InMemoryLogExporter,
    pub metrics: InMemoryMetricExporter,
    pub spans: InMemorySpanExporter,
    pub console: CaptureWriter,
}

impl TestApp {
    pub fn new() -> Self {
        let logs = InMemoryLogExporterBuilder::default()
            .keep_records_on_shutdown()
            .build();
        let metrics = InMemoryMetricExporter::default();
        let spans = InMemorySpanExporter::default();
        let console = CaptureWriter::default();

        let telemetry = Telemetry::builder("cart-api", "0.1.0")
            .environment("test")
            .log_exporter(logs.clone())
            .metric_exporter(metrics.clone())
            .span_exporter(spans.clone())
            .remote_log_level(Severity::Info)
            .console(Console::writer(console.clone(), ConsoleFormat::Json, Severity::Debug))
            .batch_config(BatchConfig {
                max_queue_size: 65_536,
                max_export_batch_size: 1024,
                scheduled_delay: Duration::from_secs(60),
            })
            .build()
            .unwrap();
        let telemetry = Arc::new(telemetry);

        let server = HttpServer::new(&ServerConfig::default(), telemetry.clone());
        Self {
            telemetry,
            server,
            logs,
            metrics,
            spans,
            console,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.server.router().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, path: &str) -> Response {
        self.send(Request::get(path).body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(&self, path: &str, body: &str) -> Response {
        self.send(
            Request::post(path)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Export everything recorded so far.
    pub async fn flush(&self) {
        self.telemetry.force_flush().await.unwrap();
    }

    /// Data points for one metric name.
    pub fn points(&self, name: &str) -> Vec<MetricPoint> {
        let finished = self.metrics.get_finished_metrics().unwrap();
        let Some(latest) = finished.last() else {
            return Vec::new();
        };

        let point = |value: f64, count: u64, attributes: Vec<KeyValue>| MetricPoint {
            name: name.to_string(),
            value,
            count,
            attributes,
        };
        let mut points = Vec::new();
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

    /// Finished spans in the order they ended.
    pub fn finished_spans(&self) -> Vec<SpanData> {
        self.spans.get_finished_spans().unwrap()
    }

    /// Records shipped to the backend.
    pub fn log_records(&self) -> Vec<SdkLogRecord> {
        self.logs
            .get_emitted_logs()
            .unwrap()
            .into_iter()
            .map(|log| log.record)
            .collect()
    }

    /// The first shipped record with `body`.
    pub fn log_with_body(&self, body: &str) -> Option<SdkLogRecord> {
        self.log_records()
            .into_iter()
            .find(|record| log_body(record).as_deref() == Some(body))
    }
}

pub async fn body_json(response: Response) -> Json {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn find<'a>(attributes: &'a [KeyValue], key: &str) -> Option<&'a Value> {
    attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| &kv.value)
}

pub fn attr_str(point: &MetricPoint, key: &str) -> Option<String> {
    find(&point.attributes, key).map(|v| v.as_str().into_owned())
}

pub fn attr_i64(point: &MetricPoint, key: &str) -> Option<i64> {
    match find(&point.attributes, key) {
        Some(Value::I64(v)) => Some(*v),
        _ => None,
    }
}

/// Attribute `key` of the first event named `event` on `span`.
pub fn event_attr(span: &SpanData, event: &str, key: &str) -> Option<Value> {
    span.events
        .events
        .iter()
        .find(|e: &&Event| e.name == event)
        .and_then(|e| find(&e.attributes, key))
        .cloned()
}

pub fn log_body(record: &SdkLogRecord) -> Option<String> {
    match record.body() {
        Some(AnyValue::String(body)) => Some(body.to_string()),
        _ => None,
    }
}

pub fn log_attr(record: &SdkLogRecord, key: &str) -> Option<AnyValue> {
    record
        .attributes_iter()
        .find(|(k, _)| k.as_str() == key)
        .map(|(_, v)| v.clone())
}

pub const CART_BODY: &str = r#"{
    "userId": "user123",
    "items": [
        {"id": "item1", "name": "Product A", "price": 29.99, "quantity": 2},
        {"id": "item2", "name": "Product B", "price": 15.50, "quantity": 1}
    ]
}"#;
