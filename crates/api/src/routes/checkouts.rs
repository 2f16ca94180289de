//! Checkout endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use checkout::CheckoutSession;
use serde::Serialize;

use crate::error::ApiError;
use crate::identity::Owner;
use crate::state::{AppState, AppStore};

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order_id: String,
    pub order_number: String,
    pub authorization_id: String,
    pub client_secret: String,
    pub total_cents: i64,
    pub reused: bool,
}

impl From<CheckoutSession> for CheckoutResponse {
    fn from(session: CheckoutSession) -> Self {
        Self {
            order_id: session.order_id.to_string(),
            order_number: session.order_number.to_string(),
            authorization_id: session.authorization_id,
            client_secret: session.client_secret,
            total_cents: session.total.cents(),
            reused: session.reused,
        }
    }
}

/// POST /checkout: place a pending order from the active cart and authorize payment.
///
/// Responds 201 for a newly placed order and 200 when an identical pending
/// order was reused.
#[tracing::instrument(skip(state))]
pub async fn initiate<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    Owner(owner_id): Owner,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError> {
    let session = state.coordinator.initiate_checkout(owner_id).await?;
    let status = if session.reused {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(session.into())))
}
