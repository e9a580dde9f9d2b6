//! In-flight request accounting.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::telemetry::{names, KeyValue, MetricsRegistry};

/// Number of requests currently inside the instrumentation middleware.
#[derive(Debug, Default)]
pub struct InFlightRequests {
    count: AtomicI64,
}

impl InFlightRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a request in and sample the gauge. The returned guard counts it
    /// out on drop, whichever way the request ends.
    pub fn enter<'a>(&'a self, registry: &'a MetricsRegistry, endpoint: &str) -> InFlightGuard<'a> {
        let value = self.count.fetch_add(1, Ordering::AcqRel) + 1;
        let endpoint = endpoint.to_string();
        sample(registry, value, &endpoint);
        InFlightGuard {
            requests: self,
            registry,
            endpoint,
        }
    }

    pub fn current(&self) -> i64 {
        self.count.load(Ordering::Acquire)
    }
}

fn sample(registry: &MetricsRegistry, value: i64, endpoint: &str) {
    registry.record_gauge(
        names::HTTP_ACTIVE_REQUESTS,
        value as f64,
        &[KeyValue::new("endpoint", endpoint.to_string())],
    );
}

pub struct InFlightGuard<'a> {
    requests: &'a InFlightRequests,
    registry: &'a MetricsRegistry,
    endpoint: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let value = self.requests.count.fetch_sub(1, Ordering::AcqRel) - 1;
        sample(self.registry, value, &self.endpoint);
    }
}
