//! HTTP route handlers.

pub mod carts;
pub mod checkouts;
pub mod dev;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod webhooks;

use common::OrderId;

use crate::error::ApiError;

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid order ID: {e}")))
}
