//! Cart endpoint.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::cart::{validation, CartRequest, ErrorResponse};
use crate::http::error::ApiError;
use crate::http::middleware::RequestTrace;
use crate::http::server::AppState;
use crate::telemetry::{names, KeyValue};

fn rejection(status: StatusCode, message: &str) -> Response {
    (status, Json(ErrorResponse::new(message))).into_response()
}

/// `POST /api/v1/cart`
pub async fn add_to_cart(
    State(state): State<AppState>,
    RequestTrace(context): RequestTrace,
    body: Bytes,
) -> Response {
    let logger = state.telemetry.logger();

    let request: CartRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            logger.in_context(&context, || {
                tracing::warn!(error = %e, "Failed to parse cart request");
            });
            return rejection(StatusCode::BAD_REQUEST, "Invalid request body");
        }
    };

    if let Err(violation) = validation::validate(&request) {
        logger.in_context(&context, || {
            tracing::warn!(
                userId = %request.user_id,
                violation = %violation,
                "Cart request failed validation"
            );
        });
        return rejection(StatusCode::BAD_REQUEST, violation.client_message());
    }

    let user_id = request.user_id.clone();
    let item_count = request.items.len();

    let (process_ctx, span) = state.telemetry.tracer().start_span(&context, "cart.process");
    let result = state.cart_service.process_cart(&process_ctx, request);
    span.end();

    let cart = match result {
        Ok(cart) => cart,
        Err(e) => {
            // The reporter writes the error-level line and the client body.
            logger.in_context(&context, || {
                tracing::warn!(userId = %user_id, error = %e, "Cart processing failed");
            });
            return ApiError::new("Failed to process cart").into_response();
        }
    };

    let metrics = state.telemetry.metrics();
    let attributes = [
        KeyValue::new("user_id", user_id.clone()),
        KeyValue::new("item_count", item_count as i64),
        KeyValue::new("status", "success"),
    ];
    metrics.record_counter(names::CART_REQUESTS_TOTAL, 1, &attributes);
    metrics.record_histogram(names::CART_ITEMS_PER_REQUEST, item_count as f64, &attributes);

    let user = [KeyValue::new("user_id", user_id.clone())];
    metrics.record_gauge(names::CART_CURRENT_VALUE, cart.total, &user);
    metrics.record_gauge(names::CART_CURRENT_ITEMS, item_count as f64, &user);

    logger.in_context(&context, || {
        tracing::info!(
            cartId = %cart.id,
            userId = %user_id,
            itemCount = item_count,
            total = cart.total,
            "Cart processed successfully"
        );
    });

    (StatusCode::CREATED, Json(cart)).into_response()
}
