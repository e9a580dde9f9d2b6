//! Cart request validation.
//!
//! Violations carry field detail for the server log. Clients only ever see
//! `client_message()`.

use thiserror::Error;

use super::schema::CartRequest;

const MAX_NAME_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CartViolation {
    #[error("userId is required")]
    MissingUserId,

    #[error("items must contain at least 1 entry")]
    NoItems,

    #[error("items[{index}].id is required")]
    MissingItemId { index: usize },

    #[error("items[{index}].name must be 1..={max} characters, got {len}", max = MAX_NAME_CHARS)]
    InvalidItemName { index: usize, len: usize },

    #[error("items[{index}].price must be at least 0, got {price}")]
    NegativePrice { index: usize, price: f64 },

    #[error("items[{index}].quantity must be at least 1, got {quantity}")]
    InvalidQuantity { index: usize, quantity: i64 },
}

impl CartViolation {
    /// Stable message safe to return to the client.
    pub fn client_message(&self) -> &'static str {
        match self {
            CartViolation::MissingUserId => "User ID is required",
            CartViolation::NoItems => "At least one item is required",
            _ => "Invalid cart item",
        }
    }
}

/// Check a parsed request. Reports the first violation found.
pub fn validate(request: &CartRequest) -> Result<(), CartViolation> {
    if request.user_id.trim().is_empty() {
        return Err(CartViolation::MissingUserId);
    }
    if request.items.is_empty() {
        return Err(CartViolation::NoItems);
    }

    for (index, item) in request.items.iter().enumerate() {
        if item.id.trim().is_empty() {
            return Err(CartViolation::MissingItemId { index });
        }
        let len = item.name.chars().count();
        if len == 0 || len > MAX_NAME_CHARS {
            return Err(CartViolation::InvalidItemName { index, len });
        }
        if !(item.price >= 0.0) {
            return Err(CartViolation::NegativePrice {
                index,
                price: item.price,
            });
        }
        if item.quantity < 1 {
            return Err(CartViolation::InvalidQuantity {
                index,
                quantity: item.quantity,
            });
        }
    }
    Ok(())
}
