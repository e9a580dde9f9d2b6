//! Cart processing.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::telemetry::{names, KeyValue, Telemetry, TraceContext};

use super::schema::{CartRequest, CartResponse, Item};

#[derive(Debug, Error)]
pub enum CartError {
    #[error("cart total is not a finite number")]
    NonFiniteTotal,
}

/// Computes cart totals and records cart-domain metrics.
pub struct CartService {
    telemetry: Arc<Telemetry>,
}

impl CartService {
    pub fn new(telemetry: Arc<Telemetry>) -> Self {
        Self { telemetry }
    }

    /// Process a validated request.
    pub fn process_cart(
        &self,
        context: &TraceContext,
        request: CartRequest,
    ) -> Result<CartResponse, CartError> {
        let item_count = request.items.len();
        let attributes = [
            KeyValue::new("user_id", request.user_id.clone()),
            KeyValue::new("item_count", item_count as i64),
        ];

        let metrics = self.telemetry.metrics();
        metrics.record_counter(names::CART_OPERATIONS_TOTAL, 1, &attributes);
        if item_count > 0 {
            metrics.record_histogram(names::CART_ITEMS_TOTAL, item_count as f64, &attributes);
        }

        self.telemetry.logger().in_context(context, || {
            tracing::info!(
                userId = %request.user_id,
                itemCount = item_count,
                "Processing cart request"
            );
        });

        let total = calculate_total(&request.items);
        if !total.is_finite() {
            return Err(CartError::NonFiniteTotal);
        }

        let now = Utc::now();
        Ok(CartResponse {
            id: Uuid::new_v4().to_string(),
            user_id: request.user_id,
            items: request.items,
            total,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Sum of `price * quantity` over all items.
pub fn calculate_total(items: &[Item]) -> f64 {
    items
        .iter()
        .map(|item| item.price * item.quantity as f64)
        .sum()
}
