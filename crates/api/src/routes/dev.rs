//! Payment simulation for non-production environments.
//!
//! The in-memory gateway has no customer to complete a payment, so these
//! routes stand in for one. They are only mounted outside production.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use checkout::{AuthorizationStatus, CheckoutError};
use serde::Serialize;

use crate::error::ApiError;
use crate::state::{AppState, AppStore};

#[derive(Debug, Serialize)]
pub struct PaymentStatusResponse {
    pub authorization_id: String,
    pub status: AuthorizationStatus,
}

fn parse_outcome(outcome: &str) -> Result<AuthorizationStatus, ApiError> {
    match outcome {
        "succeeded" | "success" => Ok(AuthorizationStatus::Succeeded),
        "failed" | "failure" => Ok(AuthorizationStatus::Failed),
        "processing" => Ok(AuthorizationStatus::Processing),
        "canceled" | "cancelled" => Ok(AuthorizationStatus::Canceled),
        "requires_payment" => Ok(AuthorizationStatus::RequiresPayment),
        other => Err(ApiError::BadRequest(format!(
            "Unknown payment outcome: {other}"
        ))),
    }
}

/// POST /dev/payments/{authorization_id}/{outcome}: set an authorization's status.
#[tracing::instrument(skip(state))]
pub async fn set_payment_status<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    Path((authorization_id, outcome)): Path<(String, String)>,
) -> Result<Json<PaymentStatusResponse>, ApiError> {
    let status = parse_outcome(&outcome)?;
    state
        .coordinator
        .gateway()
        .set_status(&authorization_id, status)
        .await
        .map_err(CheckoutError::from)?;

    tracing::info!(%authorization_id, %status, "simulated payment outcome");
    Ok(Json(PaymentStatusResponse {
        authorization_id,
        status,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_outcome() {
        assert_eq!(
            parse_outcome("succeeded").unwrap(),
            AuthorizationStatus::Succeeded
        );
        assert_eq!(
            parse_outcome("cancelled").unwrap(),
            AuthorizationStatus::Canceled
        );
        assert!(matches!(
            parse_outcome("refunded"),
            Err(ApiError::BadRequest(_))
        ));
    }
}
