//! Order query and lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use checkout::OrderSummary;
use domain::{Aggregate, Order};
use serde::{Deserialize, Serialize};

use super::checkouts::CheckoutResponse;
use super::parse_order_id;
use crate::error::ApiError;
use crate::identity::Owner;
use crate::state::{AppState, AppStore};

// -- Request types --

#[derive(Debug, Default, Deserialize)]
pub struct RefundOrderRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub order_number: Option<String>,
    pub status: String,
    pub lines: Vec<OrderLineResponse>,
    pub total_items: u32,
    pub total_cents: i64,
    pub authorization_id: Option<String>,
    pub refund_id: Option<String>,
    pub placed_at: Option<String>,
    pub paid_at: Option<String>,
    pub refunded_at: Option<String>,
    pub refund_reason: Option<String>,
    pub cancelled_at: Option<String>,
    pub cancellation_reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderLineResponse {
    pub item_id: String,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

#[derive(Debug, Serialize)]
pub struct OrderSummaryResponse {
    pub total_orders: usize,
    pub total_spent_cents: i64,
    pub pending: usize,
    pub paid: usize,
    pub refunded: usize,
    pub cancelled: usize,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id().map(|id| id.to_string()).unwrap_or_default(),
            order_number: order.order_number().map(ToString::to_string),
            status: order.status().to_string(),
            lines: order
                .lines()
                .iter()
                .map(|line| OrderLineResponse {
                    item_id: line.item_id.to_string(),
                    title: line.title.clone(),
                    author: line.author.clone(),
                    isbn: line.isbn.clone(),
                    quantity: line.quantity,
                    unit_price_cents: line.unit_price.cents(),
                    line_total_cents: line.line_total.cents(),
                })
                .collect(),
            total_items: order.total_quantity(),
            total_cents: order.total().cents(),
            authorization_id: order.authorization_id().map(String::from),
            refund_id: order.refund_id().map(String::from),
            placed_at: order.placed_at().map(|at| at.to_rfc3339()),
            paid_at: order.paid_at().map(|at| at.to_rfc3339()),
            refunded_at: order.refunded_at().map(|at| at.to_rfc3339()),
            refund_reason: order.refund_reason().map(String::from),
            cancelled_at: order.cancelled_at().map(|at| at.to_rfc3339()),
            cancellation_reason: order.cancellation_reason().map(String::from),
        }
    }
}

impl From<OrderSummary> for OrderSummaryResponse {
    fn from(summary: OrderSummary) -> Self {
        Self {
            total_orders: summary.total_orders,
            total_spent_cents: summary.total_spent.cents(),
            pending: summary.pending,
            paid: summary.paid,
            refunded: summary.refunded,
            cancelled: summary.cancelled,
        }
    }
}

// -- Handlers --

/// GET /orders: the owner's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.coordinator.list_orders(owner_id).await?;
    Ok(Json(orders.iter().map(OrderResponse::from).collect()))
}

/// GET /orders/summary: counts and spend over the owner's orders.
#[tracing::instrument(skip(state))]
pub async fn summary<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
) -> Result<Json<OrderSummaryResponse>, ApiError> {
    let summary = state.coordinator.order_summary(owner_id).await?;
    Ok(Json(summary.into()))
}

/// GET /orders/{id}: one of the owner's orders.
#[tracing::instrument(skip(state))]
pub async fn get<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state.coordinator.get_order(owner_id, order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/{id}/authorization: issue a fresh payment authorization.
#[tracing::instrument(skip(state))]
pub async fn reissue_authorization<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
    Path(id): Path<String>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let session = state
        .coordinator
        .reissue_authorization(owner_id, order_id)
        .await?;
    Ok(Json(session.into()))
}

/// POST /orders/{id}/confirm: settle the order once the gateway reports success.
#[tracing::instrument(skip(state))]
pub async fn confirm<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state.coordinator.confirm_payment(owner_id, order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/{id}/refund: refund a paid order and restore its stock.
///
/// The body is optional; `{"reason": "..."}` records why.
#[tracing::instrument(skip(state, req))]
pub async fn refund<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
    Path(id): Path<String>,
    req: Option<Json<RefundOrderRequest>>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let reason = req
        .and_then(|Json(req)| req.reason)
        .filter(|reason| !reason.trim().is_empty());
    let order = state
        .coordinator
        .refund(owner_id, order_id, reason)
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/{id}/cancel: cancel a pending order.
#[tracing::instrument(skip(state))]
pub async fn cancel<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state.coordinator.cancel_order(owner_id, order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}
