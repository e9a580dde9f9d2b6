//! Shopping cart domain.
//!
//! # Data Flow
//! ```text
//! request body
//!     → schema.rs (serde parse)
//!     → validation.rs (field rules, fixed client messages)
//!     → service.rs (total, cart-domain metrics)
//!     → CartResponse
//! ```

pub mod schema;
pub mod service;
pub mod validation;

pub use schema::{CartRequest, CartResponse, ErrorResponse, HealthResponse, Item};
pub use service::{CartError, CartService};
pub use validation::CartViolation;
