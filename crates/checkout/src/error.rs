//! Checkout error types.

use domain::{CartError, CheckoutViolation, ErrorKind, OrderError};
use store::StoreError;
use thiserror::Error;

use crate::services::{AuthorizationStatus, CatalogError, GatewayError, NotifyError};
use crate::webhook::WebhookError;

/// Errors that can occur during cart and checkout operations.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Cart rule violated.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// Order rule violated.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Catalog service error.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Payment gateway error.
    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Webhook verification or decoding error.
    #[error(transparent)]
    Webhook(#[from] WebhookError),

    /// Notification error.
    #[error(transparent)]
    Notify(#[from] NotifyError),

    /// The cart cannot be checked out as it stands.
    #[error("Cart cannot be checked out: {}", describe(.violations))]
    CheckoutBlocked { violations: Vec<CheckoutViolation> },

    /// Aggregate not found.
    #[error("{aggregate_type} not found: {id}")]
    NotFound {
        aggregate_type: &'static str,
        id: String,
    },

    /// The owner has no active cart.
    #[error("No active cart")]
    NoActiveCart,

    /// The catalog does not know the item.
    #[error("Item not found: {item_id}")]
    ItemNotFound { item_id: String },

    /// The actor does not own the aggregate.
    #[error("Permission denied")]
    PermissionDenied,

    /// The gateway has not reported a successful payment.
    #[error("Payment not completed (status: {status})")]
    PaymentNotCompleted { status: AuthorizationStatus },

    /// The order has no payment authorization to confirm.
    #[error("Order has no payment authorization")]
    MissingAuthorization,

    /// Stock moved between validation and settlement.
    #[error("Stock changed for item {item_id}")]
    StockChanged { item_id: String },

    /// Another request kept winning the race for the active cart.
    #[error("Active cart is being modified concurrently")]
    ActiveCartContention,

    /// Every generated order number collided.
    #[error("Could not allocate a unique order number after {attempts} attempts")]
    OrderNumberExhausted { attempts: u32 },

    /// Concurrent writers kept winning the race for the order.
    #[error("Order is being modified concurrently")]
    SettlementContention,

    /// A gateway call did not finish in time.
    #[error("Payment gateway timed out during {operation}")]
    GatewayTimeout { operation: &'static str },
}

fn describe(violations: &[CheckoutViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl CheckoutError {
    /// Returns the error category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CheckoutError::Cart(e) => e.kind(),
            CheckoutError::Order(e) => e.kind(),
            CheckoutError::Store(e) => e.kind(),
            CheckoutError::Catalog(e) => e.kind(),
            CheckoutError::Gateway(e) => e.kind(),
            CheckoutError::Webhook(e) => e.kind(),
            CheckoutError::Notify(_) => ErrorKind::Internal,
            CheckoutError::CheckoutBlocked { .. }
            | CheckoutError::PaymentNotCompleted { .. }
            | CheckoutError::MissingAuthorization => ErrorKind::FailedPrecondition,
            CheckoutError::NotFound { .. }
            | CheckoutError::NoActiveCart
            | CheckoutError::ItemNotFound { .. } => ErrorKind::NotFound,
            CheckoutError::PermissionDenied => ErrorKind::PermissionDenied,
            CheckoutError::StockChanged { .. }
            | CheckoutError::ActiveCartContention
            | CheckoutError::OrderNumberExhausted { .. }
            | CheckoutError::SettlementContention => ErrorKind::Conflict,
            CheckoutError::GatewayTimeout { .. } => ErrorKind::Unavailable,
        }
    }

    /// Returns true if the error is a lost compare-and-swap.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, CheckoutError::Store(e) if e.is_concurrency_conflict())
    }

    /// Returns the checkout violations carried by the error, if any.
    pub fn violations(&self) -> Option<&[CheckoutViolation]> {
        match self {
            CheckoutError::CheckoutBlocked { violations } => Some(violations),
            _ => None,
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;

#[cfg(test)]
mod tests {
    use super::*;
    use common::Version;
    use domain::{CartStatus, ItemId, OrderStatus};
    use uuid::Uuid;

    #[test]
    fn test_kinds_follow_wrapped_errors() {
        let err: CheckoutError = CartError::InvalidQuantity { quantity: 0 }.into();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err: CheckoutError = CartError::NotActive {
            status: CartStatus::Settled,
            action: "add line",
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::FailedPrecondition);

        let err: CheckoutError = OrderError::AlreadyRefunded.into();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let err: CheckoutError = OrderError::InvalidStateTransition {
            current_status: OrderStatus::Cancelled,
            action: "mark paid",
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let err: CheckoutError = GatewayError::Unavailable("down".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Unavailable);

        let err: CheckoutError = WebhookError::SignatureMismatch.into();
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);
    }

    #[test]
    fn test_checkout_kinds() {
        assert_eq!(
            CheckoutError::PaymentNotCompleted {
                status: AuthorizationStatus::Processing
            }
            .kind(),
            ErrorKind::FailedPrecondition
        );
        assert_eq!(
            CheckoutError::StockChanged {
                item_id: "A".to_string()
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(CheckoutError::PermissionDenied.kind(), ErrorKind::PermissionDenied);
        assert_eq!(
            CheckoutError::GatewayTimeout {
                operation: "authorize"
            }
            .kind(),
            ErrorKind::Unavailable
        );
    }

    #[test]
    fn test_concurrency_conflict_detection() {
        let err: CheckoutError = StoreError::ConcurrencyConflict {
            aggregate_type: "Order",
            aggregate_id: Uuid::new_v4(),
            expected: Version::first(),
            actual: Version::new(2),
        }
        .into();
        assert!(err.is_concurrency_conflict());
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(!CheckoutError::NoActiveCart.is_concurrency_conflict());
    }

    #[test]
    fn test_blocked_message_lists_violations() {
        let err = CheckoutError::CheckoutBlocked {
            violations: vec![
                CheckoutViolation::EmptyCart,
                CheckoutViolation::ItemMissing {
                    item_id: ItemId::new("Z"),
                },
            ],
        };
        let message = err.to_string();
        assert!(message.contains("Cart is empty"));
        assert!(message.contains("Item Z no longer exists"));
        assert_eq!(err.violations().map(<[_]>::len), Some(2));
    }
}
