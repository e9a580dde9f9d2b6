//! Request instrumentation middleware.
//!
//! # Responsibilities
//! - Wrap every request in RECEIVE, PROCESS and SEND spans
//! - Keep the in-flight request gauge current
//! - Emit the request counter, duration histogram and error counters
//! - Route handler-chain failures to the error reporter
//! - Write one summary log line per request
//!
//! # Data Flow
//! ```text
//! enter in-flight → extract traceparent and baggage
//!     → RECEIVE (open, annotate, close)
//!     → PROCESS (open, run handler chain, close)
//!     → error reporter (only if the handler failed)
//!     → SEND (open, annotate, close)
//!     → leave in-flight → metrics → log line
//! ```
//!
//! # Design Decisions
//! - The three spans are siblings under the inbound parent context, or share
//!   a fresh trace id when no valid `traceparent` arrives
//! - Handlers see the PROCESS context through the `RequestTrace` extractor
//! - Span and in-flight guards release on drop, so a cancelled request still
//!   closes PROCESS and decrements the gauge

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::HttpBody;
use axum::extract::{ConnectInfo, FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use crate::http::error::HandlerFailure;
use crate::telemetry::{names, KeyValue, Telemetry, TraceContext};

use super::error_reporter::ErrorReporter;
use super::in_flight::InFlightRequests;

const X_REQUEST_ID: &str = "x-request-id";
const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// What the middleware knows about a request before running it.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub method: String,
    pub path: String,
    pub user_agent: String,
    pub content_type: String,
    pub client_ip: String,
    pub request_size: u64,
    pub request_id: String,
}

impl RequestMeta {
    pub fn from_request(request: &Request) -> Self {
        let headers = request.headers();
        let header_str = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };

        let client_ip = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .or_else(|| {
                headers
                    .get(X_FORWARDED_FOR)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.split(',').next())
                    .map(|hop| hop.trim().to_string())
                    .filter(|hop| !hop.is_empty())
            })
            .unwrap_or_else(|| "unknown".to_string());

        let request_size = request.body().size_hint().exact().unwrap_or_else(|| {
            headers
                .get(header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(0)
        });

        Self {
            method: request.method().to_string(),
            path: request.uri().path().to_string(),
            user_agent: header_str(header::USER_AGENT.as_str()),
            content_type: header_str(header::CONTENT_TYPE.as_str()),
            client_ip,
            request_size,
            request_id: header_str(X_REQUEST_ID),
        }
    }
}

/// Trace context of the PROCESS span, available to handlers.
#[derive(Clone, Debug)]
pub struct RequestTrace(pub TraceContext);

impl<S> FromRequestParts<S> for RequestTrace
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestTrace>()
            .cloned()
            .unwrap_or_else(|| RequestTrace(TraceContext::root())))
    }
}

/// Coarse response classification used on the SEND span.
pub fn response_type(status: StatusCode) -> &'static str {
    match status.as_u16() {
        0..=299 => "success",
        300..=399 => "redirect",
        _ => "error",
    }
}

pub struct RequestInstrumentation {
    telemetry: Arc<Telemetry>,
    in_flight: InFlightRequests,
    reporter: ErrorReporter,
}

impl RequestInstrumentation {
    pub fn new(telemetry: Arc<Telemetry>) -> Self {
        Self {
            reporter: ErrorReporter::new(telemetry.clone()),
            in_flight: InFlightRequests::new(),
            telemetry,
        }
    }

    pub fn in_flight(&self) -> &InFlightRequests {
        &self.in_flight
    }

    pub async fn handle(&self, mut request: Request, next: Next) -> Response {
        let started = Instant::now();
        let meta = RequestMeta::from_request(&request);
        let metrics = self.telemetry.metrics();
        let tracer = self.telemetry.tracer();

        let in_flight = self.in_flight.enter(metrics, &meta.path);

        let parent = self
            .telemetry
            .propagator()
            .extract(request.headers())
            .or_new_trace();
        let span_prefix = format!("{} {}", meta.method, meta.path);

        let (receive_ctx, receive) = tracer.start_span(&parent, format!("{span_prefix} http receive"));
        tracer.add_span_event(
            &receive_ctx,
            "request.received",
            vec![
                KeyValue::new("http.method", meta.method.clone()),
                KeyValue::new("http.path", meta.path.clone()),
                KeyValue::new("http.user_agent", meta.user_agent.clone()),
                KeyValue::new("http.remote_addr", meta.client_ip.clone()),
                KeyValue::new("http.content_type", meta.content_type.clone()),
                KeyValue::new("http.request.size", meta.request_size as i64),
            ],
        );
        receive.end();

        let (process_ctx, process) = tracer.start_span(&parent, format!("{span_prefix} http process"));
        tracer.add_span_event(
            &process_ctx,
            "processing.started",
            vec![
                KeyValue::new("http.method", meta.method.clone()),
                KeyValue::new("http.path", meta.path.clone()),
            ],
        );
        request.extensions_mut().insert(RequestTrace(process_ctx.clone()));

        let mut response = next.run(request).await;

        let failure = response.extensions_mut().remove::<HandlerFailure>();
        let processing_status = if failure.is_some() { "error" } else { "success" };
        tracer.add_span_event(
            &process_ctx,
            "processing.completed",
            vec![KeyValue::new("processing.status", processing_status)],
        );
        if let Some(failure) = &failure {
            process_ctx.set_error(failure.message.clone());
        }
        process.end();

        if let Some(failure) = &failure {
            response = self.reporter.handle_error(&meta, &process_ctx, failure);
        }

        let status = response.status();
        let response_size = response.body().size_hint().exact().unwrap_or(0);
        let elapsed = started.elapsed();

        let (send_ctx, send) = tracer.start_span(&parent, format!("{span_prefix} http send"));
        tracer.add_span_event(
            &send_ctx,
            "response.sending",
            vec![
                KeyValue::new("http.status_code", i64::from(status.as_u16())),
                KeyValue::new("http.response.size", response_size as i64),
                KeyValue::new("http.duration.ms", elapsed.as_secs_f64() * 1000.0),
                KeyValue::new("response.type", response_type(status)),
            ],
        );
        send.end();

        drop(in_flight);

        let labels = [
            KeyValue::new("method", meta.method.clone()),
            KeyValue::new("path", meta.path.clone()),
            KeyValue::new("status", i64::from(status.as_u16())),
        ];
        metrics.record_counter(names::HTTP_REQUESTS_TOTAL, 1, &labels);
        metrics.record_histogram(names::HTTP_REQUEST_DURATION, elapsed.as_secs_f64(), &labels);

        if status.as_u16() >= 400 {
            self.record_error(&labels, "http_error");
        }
        if failure.is_some() {
            self.record_error(&labels, "middleware_error");
        }

        self.telemetry.logger().in_context(&send_ctx, || {
            tracing::info!(
                method = %meta.method,
                path = %meta.path,
                status = status.as_u16(),
                duration = ?elapsed,
                ip = %meta.client_ip,
                user_agent = %meta.user_agent,
                request_id = %meta.request_id,
                "HTTP Request"
            );
        });

        response
    }

    fn record_error(&self, labels: &[KeyValue], kind: &'static str) {
        let mut attributes = labels.to_vec();
        attributes.push(KeyValue::new("type", kind));
        self.telemetry
            .metrics()
            .record_counter(names::ERRORS_TOTAL, 1, &attributes);
    }
}

pub async fn instrument_request(
    State(instrumentation): State<Arc<RequestInstrumentation>>,
    request: Request,
    next: Next,
) -> Response {
    instrumentation.handle(request, next).await
}
