//! Context propagation over HTTP headers.
//!
//! W3C `traceparent`/`tracestate` and `baggage` are read and written together
//! through a composite propagator. Headers that do not parse are ignored and
//! the request starts a new trace.

use axum::http::HeaderMap;
use opentelemetry::propagation::{TextMapCompositePropagator, TextMapPropagator};
use opentelemetry_http::{HeaderExtractor, HeaderInjector};
use opentelemetry_sdk::propagation::{BaggagePropagator, TraceContextPropagator};

use super::trace::TraceContext;

pub const TRACEPARENT: &str = "traceparent";
pub const BAGGAGE: &str = "baggage";

pub struct Propagator {
    inner: TextMapCompositePropagator,
}

impl Propagator {
    pub fn new() -> Self {
        Self {
            inner: TextMapCompositePropagator::new(vec![
                Box::new(TraceContextPropagator::new()),
                Box::new(BaggagePropagator::new()),
            ]),
        }
    }

    /// Build the parent context for an inbound request.
    pub fn extract(&self, headers: &HeaderMap) -> TraceContext {
        TraceContext::from_context(self.inner.extract(&HeaderExtractor(headers)))
    }

    /// Write the context's span and baggage into outbound headers.
    pub fn inject(&self, context: &TraceContext, headers: &mut HeaderMap) {
        self.inner
            .inject_context(context.context(), &mut HeaderInjector(headers));
    }
}

impl Default for Propagator {
    fn default() -> Self {
        Self::new()
    }
}
