//! Active cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use domain::{Aggregate, Cart, CartSummary, CheckoutViolation, ItemId};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::identity::Owner;
use crate::state::{AppState, AppStore};

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct AddLineRequest {
    pub item_id: String,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLineRequest {
    pub quantity: u32,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub id: String,
    pub status: String,
    pub lines: Vec<CartLineResponse>,
    pub total_items: u32,
    pub total_cents: i64,
    pub opened_at: Option<String>,
    pub closed_at: Option<String>,
    pub settled_order_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CartLineResponse {
    pub item_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

#[derive(Debug, Serialize)]
pub struct CartSummaryResponse {
    pub total_items: u32,
    pub unique_items: usize,
    pub total_cents: i64,
}

#[derive(Debug, Serialize)]
pub struct ValidationResponse {
    pub valid: bool,
    pub violations: Vec<CheckoutViolation>,
}

impl From<&Cart> for CartResponse {
    fn from(cart: &Cart) -> Self {
        Self {
            id: cart.id().map(|id| id.to_string()).unwrap_or_default(),
            status: cart.status().to_string(),
            lines: cart
                .lines()
                .iter()
                .map(|line| CartLineResponse {
                    item_id: line.item_id.to_string(),
                    quantity: line.quantity,
                    unit_price_cents: line.unit_price.cents(),
                    line_total_cents: line.line_total().cents(),
                })
                .collect(),
            total_items: cart.total_quantity(),
            total_cents: cart.total().cents(),
            opened_at: cart.opened_at().map(|at| at.to_rfc3339()),
            closed_at: cart.closed_at().map(|at| at.to_rfc3339()),
            settled_order_id: cart.settled_order_id().map(|id| id.to_string()),
        }
    }
}

impl From<CartSummary> for CartSummaryResponse {
    fn from(summary: CartSummary) -> Self {
        Self {
            total_items: summary.total_items,
            unique_items: summary.unique_items,
            total_cents: summary.total.cents(),
        }
    }
}

// -- Handlers --

/// GET /cart: the owner's active cart, opened on first use.
#[tracing::instrument(skip(state))]
pub async fn get<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state.coordinator.carts().get_or_create_active(owner_id).await?;
    Ok(Json(CartResponse::from(&cart)))
}

/// GET /cart/summary: item counts and total of the active cart.
#[tracing::instrument(skip(state))]
pub async fn summary<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
) -> Result<Json<CartSummaryResponse>, ApiError> {
    let summary = state.coordinator.carts().summary(owner_id).await?;
    Ok(Json(summary.into()))
}

/// GET /cart/history: every cart the owner has had, newest first.
#[tracing::instrument(skip(state))]
pub async fn history<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
) -> Result<Json<Vec<CartResponse>>, ApiError> {
    let carts = state.coordinator.carts().history(owner_id).await?;
    Ok(Json(carts.iter().map(CartResponse::from).collect()))
}

/// GET /cart/validation: what would block a checkout right now.
#[tracing::instrument(skip(state))]
pub async fn validation<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
) -> Result<Json<ValidationResponse>, ApiError> {
    let violations = state.coordinator.carts().validate(owner_id).await?;
    Ok(Json(ValidationResponse {
        valid: violations.is_empty(),
        violations,
    }))
}

/// POST /cart/lines: add an item or increase its quantity.
#[tracing::instrument(skip(state))]
pub async fn add_line<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
    Json(req): Json<AddLineRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let item_id = parse_item_id(&req.item_id)?;
    let cart = state
        .coordinator
        .carts()
        .add_line(owner_id, &item_id, req.quantity)
        .await?;
    Ok(Json(CartResponse::from(&cart)))
}

/// PATCH /cart/lines/{item_id}: set the quantity of a line.
#[tracing::instrument(skip(state))]
pub async fn update_line<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
    Path(item_id): Path<String>,
    Json(req): Json<UpdateLineRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let item_id = parse_item_id(&item_id)?;
    let cart = state
        .coordinator
        .carts()
        .update_line_quantity(owner_id, &item_id, req.quantity)
        .await?;
    Ok(Json(CartResponse::from(&cart)))
}

/// DELETE /cart/lines/{item_id}: remove a line.
#[tracing::instrument(skip(state))]
pub async fn remove_line<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
    Path(item_id): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    let item_id = parse_item_id(&item_id)?;
    let cart = state
        .coordinator
        .carts()
        .remove_line(owner_id, &item_id)
        .await?;
    Ok(Json(CartResponse::from(&cart)))
}

/// DELETE /cart/lines: remove every line.
#[tracing::instrument(skip(state))]
pub async fn clear<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state.coordinator.carts().clear(owner_id).await?;
    Ok(Json(CartResponse::from(&cart)))
}

/// POST /cart/abandon: abandon the active cart.
#[tracing::instrument(skip(state))]
pub async fn abandon<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state.coordinator.carts().abandon(owner_id).await?;
    Ok(Json(CartResponse::from(&cart)))
}

fn parse_item_id(raw: &str) -> Result<ItemId, ApiError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest("item_id must not be empty".to_string()));
    }
    Ok(ItemId::new(trimmed))
}
