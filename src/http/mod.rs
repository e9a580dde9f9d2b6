//! HTTP surface of the cart API.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, outer tower layers)
//!     → middleware/instrumentation.rs (spans, in-flight gauge, request metrics)
//!     → handlers/ (health, error, cart)
//!     → error.rs (handler failures) → middleware/error_reporter.rs
//!     → Send to client
//! ```

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod server;

pub use error::{ApiError, ErrorBody, HandlerFailure};
pub use server::{AppState, HttpServer};
