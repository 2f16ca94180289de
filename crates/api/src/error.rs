//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use domain::ErrorKind;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Error raised by the checkout core.
    Checkout(CheckoutError),
    /// Bad request from the client.
    BadRequest(String),
    /// The caller could not be identified.
    Unauthenticated(String),
    /// Resource not found.
    NotFound(String),
    /// Internal server error.
    Internal(String),
}

impl ApiError {
    /// Returns the error category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Checkout(err) => err.kind(),
            ApiError::BadRequest(_) => ErrorKind::InvalidArgument,
            ApiError::Unauthenticated(_) => ErrorKind::Unauthenticated,
            ApiError::NotFound(_) => ErrorKind::NotFound,
            ApiError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Maps an error category to its HTTP status.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::FailedPrecondition => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Conflict | ErrorKind::InvalidState => StatusCode::CONFLICT,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = status_for(kind);

        let (message, violations) = match self {
            ApiError::Checkout(err) => {
                let violations = err.violations().map(<[_]>::to_vec);
                (err.to_string(), violations)
            }
            ApiError::BadRequest(msg)
            | ApiError::Unauthenticated(msg)
            | ApiError::NotFound(msg)
            | ApiError::Internal(msg) => (msg, None),
        };

        metrics::counter!("api_errors_total", "kind" => kind.as_str()).increment(1);
        match kind {
            ErrorKind::Internal => tracing::error!(error = %message, "internal server error"),
            ErrorKind::Unavailable => tracing::warn!(error = %message, "dependency unavailable"),
            _ => tracing::debug!(error = %message, kind = kind.as_str(), "request rejected"),
        }

        let mut body = serde_json::json!({
            "error": message,
            "kind": kind.as_str(),
        });
        if let Some(violations) = violations {
            body["violations"] = serde_json::json!(violations);
        }
        (status, axum::Json(body)).into_response()
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}
