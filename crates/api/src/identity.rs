//! Caller identity supplied by the upstream identity service.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::OwnerId;

use crate::error::ApiError;

/// Header carrying the authenticated owner id.
pub const OWNER_HEADER: &str = "x-owner-id";

/// The owner on whose behalf the request is made.
///
/// The identity service has already authenticated the caller, so the id is
/// trusted as-is. A missing or malformed header is rejected as
/// unauthenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner(pub OwnerId);

impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(OWNER_HEADER)
            .ok_or_else(|| ApiError::Unauthenticated(format!("missing {OWNER_HEADER} header")))?;

        let value = value
            .to_str()
            .map_err(|_| ApiError::Unauthenticated(format!("invalid {OWNER_HEADER} header")))?;

        value
            .trim()
            .parse::<OwnerId>()
            .map(Owner)
            .map_err(|_| ApiError::Unauthenticated(format!("invalid owner id: {value}")))
    }
}
