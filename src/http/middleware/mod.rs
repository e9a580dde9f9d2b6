//! Request middleware.

pub mod error_reporter;
pub mod in_flight;
pub mod instrumentation;

pub use error_reporter::ErrorReporter;
pub use in_flight::{InFlightGuard, InFlightRequests};
pub use instrumentation::{instrument_request, RequestInstrumentation, RequestMeta, RequestTrace};
