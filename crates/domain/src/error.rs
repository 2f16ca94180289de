//! Error classification shared by every layer of the checkout core.

use serde::{Deserialize, Serialize};

/// Coarse category of a failure.
///
/// Every error type in the workspace maps onto one of these kinds, which is
/// what callers (and the HTTP layer) act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input shape or range.
    InvalidArgument,

    /// Signature or identity could not be verified.
    Unauthenticated,

    /// The actor does not own the aggregate.
    PermissionDenied,

    /// Missing cart, order or item.
    NotFound,

    /// A business rule was violated (stock, price drift, payment incomplete).
    FailedPrecondition,

    /// A racing mutation won, or a uniqueness constraint was hit.
    Conflict,

    /// The aggregate is in the wrong lifecycle status for the request.
    InvalidState,

    /// A collaborator failed or timed out; the request may be retried.
    Unavailable,

    /// Unexpected failure.
    Internal,
}

impl ErrorKind {
    /// Returns true if repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Conflict | ErrorKind::Unavailable)
    }

    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::NotFound => "not_found",
            ErrorKind::FailedPrecondition => "failed_precondition",
            ErrorKind::Conflict => "conflict",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(ErrorKind::Conflict.is_retryable());
        assert!(ErrorKind::Unavailable.is_retryable());
        assert!(!ErrorKind::InvalidState.is_retryable());
        assert!(!ErrorKind::FailedPrecondition.is_retryable());
    }

    #[test]
    fn test_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::FailedPrecondition).unwrap();
        assert_eq!(json, "\"failed_precondition\"");
        assert_eq!(ErrorKind::PermissionDenied.to_string(), "permission_denied");
    }
}
