//! Catalog snapshots and checkout violations.

use serde::{Deserialize, Serialize};

use crate::value_objects::{ItemId, Money};

/// What the catalog service reports about an item at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub item_id: ItemId,
    pub title: String,
    pub author: String,
    pub isbn: String,

    /// Whether the item may currently be sold.
    pub active: bool,

    /// Current list price.
    pub price: Money,

    /// Units currently in stock.
    pub available_quantity: u32,
}

impl CatalogItem {
    /// Creates an active catalog item.
    pub fn new(
        item_id: impl Into<ItemId>,
        title: impl Into<String>,
        price: Money,
        available_quantity: u32,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            title: title.into(),
            author: String::new(),
            isbn: String::new(),
            active: true,
            price,
            available_quantity,
        }
    }

    /// Sets the author.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Sets the ISBN.
    pub fn with_isbn(mut self, isbn: impl Into<String>) -> Self {
        self.isbn = isbn.into();
        self
    }

    /// Marks the item inactive.
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// A reason a cart cannot be checked out as it stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckoutViolation {
    /// The cart has no lines.
    EmptyCart,

    /// The catalog no longer knows the item.
    ItemMissing { item_id: ItemId },

    /// The item is no longer for sale.
    ItemUnavailable { item_id: ItemId, title: String },

    /// Not enough stock for the quantity in the cart.
    InsufficientStock {
        item_id: ItemId,
        title: String,
        available: u32,
        requested: u32,
    },

    /// The catalog price moved away from the price captured in the cart.
    PriceChanged {
        item_id: ItemId,
        title: String,
        captured: Money,
        current: Money,
    },
}

impl CheckoutViolation {
    /// Returns the item the violation is about, if any.
    pub fn item_id(&self) -> Option<&ItemId> {
        match self {
            CheckoutViolation::EmptyCart => None,
            CheckoutViolation::ItemMissing { item_id }
            | CheckoutViolation::ItemUnavailable { item_id, .. }
            | CheckoutViolation::InsufficientStock { item_id, .. }
            | CheckoutViolation::PriceChanged { item_id, .. } => Some(item_id),
        }
    }
}

impl std::fmt::Display for CheckoutViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckoutViolation::EmptyCart => write!(f, "Cart is empty"),
            CheckoutViolation::ItemMissing { item_id } => {
                write!(f, "Item {item_id} no longer exists")
            }
            CheckoutViolation::ItemUnavailable { title, .. } => {
                write!(f, "\"{title}\" is no longer available")
            }
            CheckoutViolation::InsufficientStock {
                title,
                available,
                requested,
                ..
            } => write!(
                f,
                "Insufficient stock for \"{title}\". Available: {available}, In cart: {requested}"
            ),
            CheckoutViolation::PriceChanged {
                title,
                captured,
                current,
                ..
            } => write!(
                f,
                "Price changed for \"{title}\". Current: {current}, In cart: {captured}"
            ),
        }
    }
}
