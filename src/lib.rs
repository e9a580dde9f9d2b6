//! Cart API service library.
//!
//! A small shopping-cart HTTP API whose every request is observed through a
//! shared telemetry provider: metrics, traces and logs exported to a remote
//! backend in batches.

pub mod cart;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod telemetry;

pub use config::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use telemetry::Telemetry;
