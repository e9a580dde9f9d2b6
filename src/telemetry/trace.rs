//! Span controller.
//!
//! # Responsibilities
//! - Start spans as children of an explicitly passed `TraceContext`
//! - Attach events to the span active in a context
//! - Hand finished spans to the SDK span processor
//!
//! # Design Decisions
//! - No ambient span stack: contexts are values threaded through the call chain
//! - `SpanGuard` ends its span on drop, so every exit path releases it
//! - Ending twice, or adding an event to an ended span, is a silent no-op

use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use opentelemetry::trace::{SpanContext, Status, TraceContextExt, TraceId, Tracer as _};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::trace::{IdGenerator, RandomIdGenerator, SdkTracer};

/// Context carried through the call chain.
///
/// Wraps an OpenTelemetry [`Context`] holding the active local span, or the
/// remote parent extracted from inbound headers. A context without a span
/// may still pin the trace id that its root spans will share.
#[derive(Clone, Default)]
pub struct TraceContext {
    context: Context,
    trace_id: Option<TraceId>,
}

impl TraceContext {
    /// Empty context. Spans started from it become trace roots.
    pub fn root() -> Self {
        Self::default()
    }

    /// Empty context with a fixed trace id. Sibling root spans started from
    /// it land in the same trace.
    pub fn new_trace() -> Self {
        Self::root().or_new_trace()
    }

    /// Pin a fresh trace id unless a span context is already present.
    /// Baggage and other entries are kept.
    pub fn or_new_trace(mut self) -> Self {
        if self.span_context().is_none() && self.trace_id.is_none() {
            self.trace_id = Some(RandomIdGenerator::default().new_trace_id());
        }
        self
    }

    pub(crate) fn from_context(context: Context) -> Self {
        Self {
            context,
            trace_id: None,
        }
    }

    /// The underlying OpenTelemetry context.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Identity of the active span, local or remote.
    pub fn span_context(&self) -> Option<SpanContext> {
        let span = self.context.span();
        let span_context = span.span_context();
        span_context.is_valid().then(|| span_context.clone())
    }

    /// True when the context carries a local span that has not ended.
    pub fn is_recording(&self) -> bool {
        self.context.span().is_recording()
    }

    /// Attach an event to the active span. No-op without a recording span.
    pub fn add_event(&self, name: impl Into<Cow<'static, str>>, attributes: Vec<KeyValue>) {
        self.context.span().add_event(name, attributes);
    }

    /// Mark the active span as failed.
    pub fn set_error(&self, description: impl Into<Cow<'static, str>>) {
        self.context.span().set_status(Status::error(description));
    }
}

impl fmt::Debug for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceContext")
            .field("span", &self.span_context())
            .field("recording", &self.is_recording())
            .finish()
    }
}

/// Owner of one started span.
#[must_use = "dropping the guard ends the span immediately"]
pub struct SpanGuard {
    context: Option<Context>,
}

impl SpanGuard {
    /// End the span. Later calls do nothing.
    pub fn end(&self) {
        if let Some(context) = &self.context {
            context.span().end();
        }
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        self.end();
    }
}

/// Starts spans on the provider's SDK tracer.
#[derive(Clone)]
pub struct Tracer {
    inner: SdkTracer,
    shut_down: Arc<AtomicBool>,
}

impl Tracer {
    pub(crate) fn new(inner: SdkTracer, shut_down: Arc<AtomicBool>) -> Self {
        Self { inner, shut_down }
    }

    /// Start a child of `parent`.
    ///
    /// After shutdown the returned context is the parent itself and the guard
    /// does nothing.
    pub fn start_span(
        &self,
        parent: &TraceContext,
        name: impl Into<Cow<'static, str>>,
    ) -> (TraceContext, SpanGuard) {
        if self.shut_down.load(Ordering::Acquire) {
            return (parent.clone(), SpanGuard { context: None });
        }

        let mut builder = self.inner.span_builder(name);
        if !parent.context.has_active_span() {
            if let Some(trace_id) = parent.trace_id {
                builder = builder.with_trace_id(trace_id);
            }
        }
        let span = self.inner.build_with_context(builder, &parent.context);
        let context = parent.context.with_span(span);

        (
            TraceContext::from_context(context.clone()),
            SpanGuard {
                context: Some(context),
            },
        )
    }

    /// Attach an event to whatever span is active in `context`.
    pub fn add_span_event(
        &self,
        context: &TraceContext,
        name: impl Into<Cow<'static, str>>,
        attributes: Vec<KeyValue>,
    ) {
        context.add_event(name, attributes);
    }
}
