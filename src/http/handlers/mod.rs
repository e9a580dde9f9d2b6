//! Route handlers.

pub mod cart;
pub mod health;

pub use cart::add_to_cart;
pub use health::{get_error, get_health};
