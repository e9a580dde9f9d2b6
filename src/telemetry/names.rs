//! Well-known metric names.
//!
//! These identifiers are consumed by dashboards and must not be renamed.

use super::metrics::InstrumentKind;

pub const HTTP_REQUESTS_TOTAL: &str = "fiber.shbm.http.requests.total.v2";
pub const HTTP_REQUEST_DURATION: &str = "fiber.shbm.http.request.duration.seconds";
pub const HTTP_ACTIVE_REQUESTS: &str = "fiber.shbm.http.active.requests";
pub const ERRORS_TOTAL: &str = "fiber.shbm.errors.total";

pub const CART_CURRENT_ITEMS: &str = "fiber.shbm.cart.current.items";
pub const CART_CURRENT_VALUE: &str = "fiber.shbm.cart.current.value";
pub const CART_REQUESTS_TOTAL: &str = "fiber.shbm.cart.requests.total";
pub const CART_OPERATIONS_TOTAL: &str = "fiber.shbm.cart.operations.total";
pub const CART_ITEMS_TOTAL: &str = "fiber.shbm.cart.items.total";
pub const CART_ITEMS_PER_REQUEST: &str = "fiber.shbm.cart.items.per.request";

pub const HEALTH_CHECKS_TOTAL: &str = "fiber.shbm.health.checks.total";
pub const INTENTIONAL_ERRORS_TOTAL: &str = "fiber.shbm.intentional.errors.total";

/// Instruments created when the provider starts.
pub const PRECREATED: &[(&str, InstrumentKind)] = &[
    (HTTP_REQUESTS_TOTAL, InstrumentKind::Counter),
    (HTTP_REQUEST_DURATION, InstrumentKind::Histogram),
    (HTTP_ACTIVE_REQUESTS, InstrumentKind::Gauge),
    (ERRORS_TOTAL, InstrumentKind::Counter),
    (CART_CURRENT_ITEMS, InstrumentKind::Gauge),
    (CART_REQUESTS_TOTAL, InstrumentKind::Counter),
    (CART_ITEMS_PER_REQUEST, InstrumentKind::Histogram),
];
