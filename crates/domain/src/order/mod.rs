//! Order aggregate and related types.

mod aggregate;
mod events;
mod number;
mod state;

pub use aggregate::Order;
pub use events::{
    AuthorizationAttachedData, OrderCancelledData, OrderEvent, OrderPaidData, OrderPlacedData,
    OrderRefundedData,
};
pub use number::OrderNumber;
pub use state::OrderStatus;

use thiserror::Error;

use crate::error::ErrorKind;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Order is already placed.
    #[error("Order already placed")]
    AlreadyPlaced,

    /// Order has no lines.
    #[error("Cannot place an order from an empty cart")]
    NoLines,

    /// A cart line refers to an item the catalog no longer knows.
    #[error("Catalog entry missing for item {item_id}")]
    CatalogEntryMissing { item_id: String },

    /// Order is not in the expected status.
    #[error("Invalid state transition: cannot {action} from {current_status} status")]
    InvalidStateTransition {
        current_status: OrderStatus,
        action: &'static str,
    },

    /// Order has already been refunded.
    #[error("Order already refunded")]
    AlreadyRefunded,

    /// The authorization was never issued for this order.
    #[error("Authorization {authorization_id} does not belong to this order")]
    UnknownAuthorization { authorization_id: String },
}

impl OrderError {
    /// Returns the error category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::AlreadyPlaced => ErrorKind::Conflict,
            OrderError::NoLines => ErrorKind::InvalidArgument,
            OrderError::CatalogEntryMissing { .. } | OrderError::UnknownAuthorization { .. } => {
                ErrorKind::NotFound
            }
            OrderError::InvalidStateTransition { .. } | OrderError::AlreadyRefunded => {
                ErrorKind::InvalidState
            }
        }
    }
}
