//! Telemetry provider.
//!
//! # Responsibilities
//! - Own the OpenTelemetry logger, meter and tracer providers
//! - Build the metrics registry, tracer, propagator and log fan-out
//! - Drain all pipelines on shutdown under a caller-supplied deadline
//!
//! # Data Flow
//! ```text
//! initialize: resource → logs → metrics → traces → propagation
//! shutdown:   close intakes → drain logs → drain metrics → drain traces
//! ```
//!
//! # Design Decisions
//! - Constructed once in `main` and passed by `Arc`; there is no global lookup
//! - Any failing stage aborts construction; the service never runs without telemetry
//! - After shutdown every operation is a no-op and a second shutdown is an error
//! - SDK flush and shutdown calls block, so they run on the blocking pool

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;
use opentelemetry::metrics::MeterProvider as _;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::{WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::logs::{BatchLogProcessor, LogExporter, LoggerProviderBuilder, SdkLoggerProvider};
use opentelemetry_sdk::metrics::exporter::PushMetricExporter;
use opentelemetry_sdk::metrics::{MeterProviderBuilder, PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::{BatchSpanProcessor, SdkTracerProvider, SpanExporter, TracerProviderBuilder};
use opentelemetry_sdk::{logs, trace, Resource};
use tokio::time::Instant;
use url::Url;

use crate::config::TelemetryConfig;

use super::error::{ExportError, InitError, ShutdownError, Signal};
use super::logging::{fan_out, Logger, Severity};
use super::metrics::MetricsRegistry;
use super::names;
use super::propagation::Propagator;
use super::resource::service_resource;
use super::sinks::{remote, Console};
use super::trace::Tracer;

/// Instrumentation scope for every meter and tracer handed out.
const SCOPE: &str = "cart-api";

type InstallLogs = Box<dyn FnOnce(LoggerProviderBuilder, &BatchConfig) -> LoggerProviderBuilder + Send>;
type InstallMetrics = Box<dyn FnOnce(MeterProviderBuilder, &BatchConfig) -> MeterProviderBuilder + Send>;
type InstallSpans = Box<dyn FnOnce(TracerProviderBuilder, &BatchConfig) -> TracerProviderBuilder + Send>;

/// Batching shared by the three pipelines.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub max_queue_size: usize,
    pub max_export_batch_size: usize,
    /// Delay between scheduled exports; also the metric collection interval.
    pub scheduled_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 2048,
            max_export_batch_size: 512,
            scheduled_delay: Duration::from_secs(1),
        }
    }
}

impl BatchConfig {
    fn for_logs(&self) -> logs::BatchConfig {
        logs::BatchConfigBuilder::default()
            .with_max_queue_size(self.max_queue_size)
            .with_max_export_batch_size(self.max_export_batch_size)
            .with_scheduled_delay(self.scheduled_delay)
            .build()
    }

    fn for_spans(&self) -> trace::BatchConfig {
        trace::BatchConfigBuilder::default()
            .with_max_queue_size(self.max_queue_size)
            .with_max_export_batch_size(self.max_export_batch_size)
            .with_scheduled_delay(self.scheduled_delay)
            .build()
    }
}

/// Process-wide telemetry facade.
pub struct Telemetry {
    resource: Resource,
    logs: SdkLoggerProvider,
    meters: SdkMeterProvider,
    spans: SdkTracerProvider,
    registry: MetricsRegistry,
    tracer: Tracer,
    logger: Logger,
    propagator: Propagator,
    shut_down: Arc<AtomicBool>,
}

impl Telemetry {
    /// Build the provider exporting OTLP/HTTP to the configured backend.
    pub fn initialize(
        service_name: &str,
        service_version: &str,
        config: &TelemetryConfig,
    ) -> Result<Self, InitError> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| InitError::InvalidEndpoint {
            endpoint: config.endpoint.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(InitError::InvalidEndpoint {
                endpoint: config.endpoint.clone(),
                reason: format!("unsupported scheme '{}'", endpoint.scheme()),
            });
        }

        let base = config.endpoint.trim_end_matches('/');
        let timeout = Duration::from_secs(config.export_timeout_secs);
        let headers: HashMap<String, String> = config
            .api_key
            .iter()
            .map(|key| (config.api_key_header.clone(), key.clone()))
            .collect();
        let signal_url = |signal: Signal| format!("{}/v1/{}", base, signal);

        let log_exporter = opentelemetry_otlp::LogExporter::builder()
            .with_http()
            .with_endpoint(signal_url(Signal::Logs))
            .with_timeout(timeout)
            .with_headers(headers.clone())
            .build()
            .map_err(|source| InitError::Exporter {
                signal: Signal::Logs,
                source,
            })?;
        let metric_exporter = opentelemetry_otlp::MetricExporter::builder()
            .with_http()
            .with_endpoint(signal_url(Signal::Metrics))
            .with_timeout(timeout)
            .with_headers(headers.clone())
            .build()
            .map_err(|source| InitError::Exporter {
                signal: Signal::Metrics,
                source,
            })?;
        let span_exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(signal_url(Signal::Traces))
            .with_timeout(timeout)
            .with_headers(headers)
            .build()
            .map_err(|source| InitError::Exporter {
                signal: Signal::Traces,
                source,
            })?;

        let batch = BatchConfig {
            max_queue_size: config.batch.max_queue_size,
            max_export_batch_size: config.batch.max_export_batch_size,
            scheduled_delay: Duration::from_millis(config.batch.scheduled_delay_ms),
        };

        let mut builder = Telemetry::builder(service_name, service_version)
            .environment(&config.environment)
            .log_exporter(log_exporter)
            .metric_exporter(metric_exporter)
            .span_exporter(span_exporter)
            .remote_log_level(Severity::parse_lenient(&config.log_level))
            .console(Console::stdout(
                config.console_format,
                Severity::parse_lenient(config.effective_console_level()),
            ))
            .batch_config(batch)
            .install_global_subscriber(config.install_global_subscriber);

        if config.prometheus_enabled {
            let addr: SocketAddr = config
                .prometheus_address
                .parse()
                .map_err(|e: std::net::AddrParseError| InitError::Prometheus(e.to_string()))?;
            builder = builder.prometheus(addr);
        }

        builder.build()
    }

    pub fn builder(service_name: &str, service_version: &str) -> TelemetryBuilder {
        TelemetryBuilder::new(service_name, service_version)
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// Metric instrument registry.
    pub fn metrics(&self) -> &MetricsRegistry {
        &self.registry
    }

    /// Span controller.
    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// Logging handle writing through the fan-out.
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn propagator(&self) -> &Propagator {
        &self.propagator
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Export everything recorded so far. Every pipeline is flushed; the
    /// first failure is returned. No-op after shutdown.
    pub async fn force_flush(&self) -> Result<(), ExportError> {
        if self.is_shut_down() {
            return Ok(());
        }
        let logs = self.logs.clone();
        let meters = self.meters.clone();
        let spans = self.spans.clone();

        let logs = flush(Signal::Logs, move || logs.force_flush()).await;
        let metrics = flush(Signal::Metrics, move || meters.force_flush()).await;
        let traces = flush(Signal::Traces, move || spans.force_flush()).await;
        logs.and(metrics).and(traces)
    }

    /// Drain logs, then metrics, then traces.
    ///
    /// Stops at the first stage that fails or misses the deadline and reports it.
    pub async fn shutdown(&self, deadline: Duration) -> Result<(), ShutdownError> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Err(ShutdownError::AlreadyShutdown);
        }
        let until = Instant::now() + deadline;

        let logs = self.logs.clone();
        let meters = self.meters.clone();
        let spans = self.spans.clone();

        drain(Signal::Logs, until, move || logs.shutdown()).await?;
        drain(Signal::Metrics, until, move || meters.shutdown()).await?;
        drain(Signal::Traces, until, move || spans.shutdown()).await?;
        Ok(())
    }
}

async fn flush<F>(signal: Signal, stage: F) -> Result<(), ExportError>
where
    F: FnOnce() -> OTelSdkResult + Send + 'static,
{
    match tokio::task::spawn_blocking(stage).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(ExportError::Pipeline { signal, source }),
        Err(_) => Err(ExportError::Aborted { signal }),
    }
}

async fn drain<F>(signal: Signal, until: Instant, stage: F) -> Result<(), ShutdownError>
where
    F: FnOnce() -> OTelSdkResult + Send + 'static,
{
    match tokio::time::timeout_at(until, tokio::task::spawn_blocking(stage)).await {
        Ok(Ok(Ok(()))) => Ok(()),
        Ok(Ok(Err(source))) => Err(ShutdownError::Stage { signal, source }),
        Ok(Err(_)) => Err(ShutdownError::Aborted { signal }),
        Err(_) => Err(ShutdownError::DeadlineExceeded { signal }),
    }
}

/// Staged construction of a [`Telemetry`] provider.
pub struct TelemetryBuilder {
    service_name: String,
    service_version: String,
    environment: String,
    log_exporter: Option<InstallLogs>,
    metric_exporter: Option<InstallMetrics>,
    span_exporter: Option<InstallSpans>,
    remote_log_level: Severity,
    console: Option<Console>,
    batch: BatchConfig,
    prometheus: Option<SocketAddr>,
    install_global_subscriber: bool,
}

impl TelemetryBuilder {
    fn new(service_name: &str, service_version: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            service_version: service_version.to_string(),
            environment: String::new(),
            log_exporter: None,
            metric_exporter: None,
            span_exporter: None,
            remote_log_level: Severity::Info,
            console: None,
            batch: BatchConfig::default(),
            prometheus: None,
            install_global_subscriber: false,
        }
    }

    pub fn environment(mut self, environment: &str) -> Self {
        self.environment = environment.to_string();
        self
    }

    pub fn log_exporter<E: LogExporter + 'static>(mut self, exporter: E) -> Self {
        self.log_exporter = Some(Box::new(move |builder: LoggerProviderBuilder, batch: &BatchConfig| {
            builder.with_log_processor(
                BatchLogProcessor::builder(exporter)
                    .with_batch_config(batch.for_logs())
                    .build(),
            )
        }));
        self
    }

    pub fn metric_exporter<E: PushMetricExporter + 'static>(mut self, exporter: E) -> Self {
        self.metric_exporter = Some(Box::new(move |builder: MeterProviderBuilder, batch: &BatchConfig| {
            builder.with_reader(
                PeriodicReader::builder(exporter)
                    .with_interval(batch.scheduled_delay)
                    .build(),
            )
        }));
        self
    }

    pub fn span_exporter<E: SpanExporter + 'static>(mut self, exporter: E) -> Self {
        self.span_exporter = Some(Box::new(move |builder: TracerProviderBuilder, batch: &BatchConfig| {
            builder.with_span_processor(
                BatchSpanProcessor::builder(exporter)
                    .with_batch_config(batch.for_spans())
                    .build(),
            )
        }));
        self
    }

    /// Floor for records shipped to the backend.
    pub fn remote_log_level(mut self, level: Severity) -> Self {
        self.remote_log_level = level;
        self
    }

    /// Local console destination with its own floor.
    pub fn console(mut self, console: Console) -> Self {
        self.console = Some(console);
        self
    }

    pub fn batch_config(mut self, batch: BatchConfig) -> Self {
        self.batch = batch;
        self
    }

    /// Serve a Prometheus scrape endpoint mirroring every measurement.
    pub fn prometheus(mut self, addr: SocketAddr) -> Self {
        self.prometheus = Some(addr);
        self
    }

    pub fn install_global_subscriber(mut self, install: bool) -> Self {
        self.install_global_subscriber = install;
        self
    }

    pub fn build(self) -> Result<Telemetry, InitError> {
        // Resource / service identity
        let resource = service_resource(&self.service_name, &self.service_version, &self.environment)?;
        let shut_down = Arc::new(AtomicBool::new(false));

        // Logs
        let install_logs = self
            .log_exporter
            .ok_or(InitError::MissingExporter(Signal::Logs))?;
        let logs = install_logs(
            SdkLoggerProvider::builder().with_resource(resource.clone()),
            &self.batch,
        )
        .build();

        let mut sinks = vec![remote(&logs, self.remote_log_level, shut_down.clone())?];
        if let Some(console) = self.console {
            sinks.push(console.into_sink(shut_down.clone())?);
        }
        let dispatch = fan_out(sinks);
        let logger = Logger::new(dispatch.clone(), shut_down.clone());

        if self.install_global_subscriber {
            tracing::dispatcher::set_global_default(dispatch)
                .map_err(|e| InitError::Subscriber(e.to_string()))?;
        }

        // Metrics
        let install_metrics = self
            .metric_exporter
            .ok_or(InitError::MissingExporter(Signal::Metrics))?;
        let meters = install_metrics(
            SdkMeterProvider::builder().with_resource(resource.clone()),
            &self.batch,
        )
        .build();

        let mirror = match self.prometheus {
            Some(addr) => {
                PrometheusBuilder::new()
                    .with_http_listener(addr)
                    .install()
                    .map_err(|e| InitError::Prometheus(e.to_string()))?;
                tracing::info!(address = %addr, "Prometheus scrape endpoint listening");
                true
            }
            None => false,
        };

        let registry = MetricsRegistry::new(meters.meter(SCOPE), mirror, shut_down.clone());
        registry
            .precreate(names::PRECREATED)
            .map_err(|e| InitError::InvalidResource(e.to_string()))?;

        // Traces
        let install_spans = self
            .span_exporter
            .ok_or(InitError::MissingExporter(Signal::Traces))?;
        let spans = install_spans(
            SdkTracerProvider::builder().with_resource(resource.clone()),
            &self.batch,
        )
        .build();
        let tracer = Tracer::new(spans.tracer(SCOPE), shut_down.clone());

        // Propagation
        let propagator = Propagator::new();

        tracing::info!(
            service = %self.service_name,
            environment = %self.environment,
            "Telemetry initialized"
        );

        Ok(Telemetry {
            resource,
            logs,
            meters,
            spans,
            registry,
            tracer,
            logger,
            propagator,
            shut_down,
        })
    }
}
