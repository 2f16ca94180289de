//! Inbound payment gateway notifications.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use checkout::{CheckoutError, SIGNATURE_HEADER, WebhookOutcome};
use serde::Serialize;

use crate::error::ApiError;
use crate::state::{AppState, AppStore};

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub received: bool,
    pub event_id: String,
    #[serde(flatten)]
    pub outcome: WebhookOutcome,
}

/// POST /webhooks/payments: verify and apply a payment notification.
///
/// The signature covers the raw body, so the body is read as bytes and only
/// decoded after verification. Duplicate deliveries are acknowledged without
/// further effect.
#[tracing::instrument(skip(state, headers, body))]
pub async fn payments<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    let signature = match headers.get(SIGNATURE_HEADER) {
        Some(value) => Some(value.to_str().map_err(|_| {
            ApiError::Unauthenticated(format!("invalid {SIGNATURE_HEADER} header"))
        })?),
        None => None,
    };

    let event = state
        .verifier
        .decode(&body, signature)
        .map_err(CheckoutError::from)?;
    let event_id = event.id.clone();

    let outcome = state.coordinator.handle_payment_event(event).await?;
    tracing::info!(%event_id, ?outcome, "payment notification handled");

    Ok(Json(WebhookResponse {
        received: true,
        event_id,
        outcome,
    }))
}
