//! Cart aggregate and related types.

mod aggregate;
mod events;
mod state;

pub use aggregate::{Cart, CartSummary};
pub use events::{
    CartAbandonedData, CartClearedData, CartEvent, CartOpenedData, CartSettledData,
    LineAddedData, LineQuantityChangedData, LineRemovedData,
};
pub use state::CartStatus;

use thiserror::Error;

use crate::error::ErrorKind;

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Cart is already opened.
    #[error("Cart already opened")]
    AlreadyOpened,

    /// Cart is not in the Active status.
    #[error("Cart is {status}: cannot {action}")]
    NotActive {
        status: CartStatus,
        action: &'static str,
    },

    /// Invalid quantity.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// Line not found in cart.
    #[error("Item not in cart: {item_id}")]
    LineNotFound { item_id: String },

    /// The catalog reports the item inactive.
    #[error("\"{title}\" is no longer available")]
    ItemUnavailable { item_id: String, title: String },

    /// Not enough stock for the requested quantity.
    #[error("Insufficient stock for \"{title}\". Available: {available}, Requested: {requested}")]
    InsufficientStock {
        item_id: String,
        title: String,
        available: u32,
        requested: u32,
    },
}

impl CartError {
    /// Returns the error category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CartError::AlreadyOpened => ErrorKind::Conflict,
            CartError::NotActive { .. } => ErrorKind::FailedPrecondition,
            CartError::InvalidQuantity { .. } => ErrorKind::InvalidArgument,
            CartError::LineNotFound { .. } => ErrorKind::NotFound,
            CartError::ItemUnavailable { .. } | CartError::InsufficientStock { .. } => {
                ErrorKind::FailedPrecondition
            }
        }
    }
}
