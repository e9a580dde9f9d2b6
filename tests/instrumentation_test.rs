//! Span lifecycle and in-flight accounting of the request middleware.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use opentelemetry::trace::{SpanId, Status, TraceId};
use opentelemetry::Value;
use opentelemetry_sdk::trace::SpanData;

use cart_api::telemetry::names;

mod common;
use common::{attr_str, event_attr, TestApp, CART_BODY};

fn request_spans(app: &TestApp, prefix: &str) -> Vec<SpanData> {
    app.finished_spans()
        .into_iter()
        .filter(|s| s.name.starts_with(prefix))
        .collect()
}

fn text(value: &str) -> Option<Value> {
    Some(Value::from(value.to_string()))
}

#[tokio::test]
async fn test_three_spans_in_order() {
    let app = TestApp::new();
    let response = app.get("/api/v1/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    app.flush().await;

    let spans = request_spans(&app, "GET /api/v1/health");
    let names: Vec<&str> = spans.iter().map(|s| s.name.as_ref()).collect();
    assert_eq!(
        names,
        vec![
            "GET /api/v1/health http receive",
            "GET /api/v1/health http process",
            "GET /api/v1/health http send",
        ]
    );

    let (receive, process, send) = (&spans[0], &spans[1], &spans[2]);
    assert!(receive.end_time <= process.start_time);
    assert!(process.end_time <= send.start_time);
    let trace_id = receive.span_context.trace_id();
    assert_eq!(process.span_context.trace_id(), trace_id);
    assert_eq!(send.span_context.trace_id(), trace_id);
    assert!(spans.iter().all(|s| s.parent_span_id == SpanId::INVALID));

    assert_eq!(receive.events.events[0].name, "request.received");
    assert_eq!(event_attr(receive, "request.received", "http.method"), text("GET"));
    assert_eq!(
        event_attr(process, "processing.completed", "processing.status"),
        text("success")
    );
    assert_eq!(event_attr(send, "response.sending", "response.type"), text("success"));
    assert_eq!(process.status, Status::Unset);
}

#[tokio::test]
async fn test_process_span_marks_handler_error() {
    let app = TestApp::new();
    app.get("/api/v1/error").await;
    app.flush().await;

    let spans = request_spans(&app, "GET /api/v1/error");
    assert_eq!(spans.len(), 3);
    assert_eq!(
        event_attr(&spans[1], "processing.completed", "processing.status"),
        text("error")
    );
    assert_eq!(
        spans[1].status,
        Status::error("This endpoint always returns an error")
    );
    assert_eq!(event_attr(&spans[2], "response.sending", "response.type"), text("error"));
    assert_eq!(
        event_attr(&spans[2], "response.sending", "http.status_code"),
        Some(Value::I64(500))
    );
}

#[tokio::test]
async fn test_upstream_traceparent_is_joined() {
    let app = TestApp::new();
    let response = app
        .send(
            Request::get("/api/v1/health")
                .header(
                    "traceparent",
                    "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    app.flush().await;

    let spans = request_spans(&app, "GET /api/v1/health");
    assert_eq!(spans.len(), 3);
    let upstream_trace = TraceId::from_hex("4bf92f3577b34da6a3ce929d0e0e4736").unwrap();
    let upstream_span = SpanId::from_hex("00f067aa0ba902b7").unwrap();
    for span in &spans {
        assert_eq!(span.span_context.trace_id(), upstream_trace);
        assert_eq!(span.parent_span_id, upstream_span);
    }
}

#[tokio::test]
async fn test_cart_span_nests_under_process() {
    let app = TestApp::new();
    app.post_json("/api/v1/cart", CART_BODY).await;
    app.flush().await;

    let spans = app.finished_spans();
    let process = spans
        .iter()
        .find(|s| s.name == "POST /api/v1/cart http process")
        .unwrap();
    let cart = spans.iter().find(|s| s.name == "cart.process").unwrap();
    assert_eq!(cart.parent_span_id, process.span_context.span_id());
    assert_eq!(cart.span_context.trace_id(), process.span_context.trace_id());

    let record = app.log_with_body("Processing cart request").unwrap();
    let linked = record.trace_context().unwrap();
    assert_eq!(linked.span_id, cart.span_context.span_id());
    assert_eq!(linked.trace_id, cart.span_context.trace_id());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_in_flight_gauge_under_concurrency() {
    let app = Arc::new(TestApp::new());
    let router = app.server.router();

    let tasks: Vec<_> = (0..200)
        .map(|i| {
            let router = router.clone();
            tokio::spawn(async move {
                let request = if i % 2 == 0 {
                    Request::get("/api/v1/health").body(Body::empty()).unwrap()
                } else {
                    Request::post("/api/v1/cart")
                        .header("content-type", "application/json")
                        .body(Body::from(CART_BODY))
                        .unwrap()
                };
                router.oneshot(request).await.unwrap().status()
            })
        })
        .collect();

    for task in tasks {
        assert!(task.await.unwrap().is_success());
    }
    assert_eq!(app.server.instrumentation().in_flight().current(), 0);

    app.flush().await;
    // One gauge series per endpoint; the last write wins.
    let samples = app.points(names::HTTP_ACTIVE_REQUESTS);
    assert_eq!(samples.len(), 2);
    assert!(samples.iter().all(|p| p.value >= 0.0 && p.value <= 200.0));
    assert!(samples.iter().all(|p| attr_str(p, "endpoint").is_some()));

    let requests = app.points(names::HTTP_REQUESTS_TOTAL);
    assert_eq!(requests.iter().map(|p| p.value).sum::<f64>(), 200.0);
    assert_eq!(request_spans(&app, "").len(), 200 * 3 + 100);
}
