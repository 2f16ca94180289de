//! Catalog service trait and in-memory implementation.
//!
//! The catalog is the stock ledger: per-item decrements are atomic
//! check-and-decrement operations and stock is never negative.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use domain::{CatalogItem, ErrorKind, ItemId, Money};
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors reported by the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog does not know the item.
    #[error("Item not found: {item_id}")]
    ItemNotFound { item_id: String },

    /// A decrement asked for more than is available.
    #[error("Insufficient stock for {item_id}: available {available}, requested {requested}")]
    InsufficientStock {
        item_id: String,
        available: u32,
        requested: u32,
    },

    /// The catalog could not be reached.
    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

impl CatalogError {
    /// Returns the error category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::ItemNotFound { .. } => ErrorKind::NotFound,
            CatalogError::InsufficientStock { .. } => ErrorKind::Conflict,
            CatalogError::Unavailable(_) => ErrorKind::Unavailable,
        }
    }
}

/// Trait for catalog and stock operations.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Returns the current snapshot of an item, or None if it is unknown.
    async fn get_item(&self, item_id: &ItemId) -> Result<Option<CatalogItem>, CatalogError>;

    /// Atomically checks and decrements stock, returning the remaining quantity.
    async fn decrement_stock(&self, item_id: &ItemId, quantity: u32) -> Result<u32, CatalogError>;

    /// Unconditionally increments stock, returning the new quantity.
    async fn increment_stock(&self, item_id: &ItemId, quantity: u32) -> Result<u32, CatalogError>;

    /// Returns snapshots for every known item among `item_ids`.
    async fn get_items(
        &self,
        item_ids: &[ItemId],
    ) -> Result<HashMap<ItemId, CatalogItem>, CatalogError> {
        let mut items = HashMap::with_capacity(item_ids.len());
        for item_id in item_ids {
            if let Some(item) = self.get_item(item_id).await? {
                items.insert(item_id.clone(), item);
            }
        }
        Ok(items)
    }
}

/// In-memory catalog for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    items: Arc<RwLock<HashMap<ItemId, CatalogItem>>>,
}

impl InMemoryCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog holding the given items.
    pub fn with_items(items: impl IntoIterator<Item = CatalogItem>) -> Self {
        let items = items
            .into_iter()
            .map(|item| (item.item_id.clone(), item))
            .collect();
        Self {
            items: Arc::new(RwLock::new(items)),
        }
    }

    /// Inserts or replaces an item.
    pub async fn upsert(&self, item: CatalogItem) {
        self.items.write().await.insert(item.item_id.clone(), item);
    }

    /// Removes an item from the catalog.
    pub async fn remove(&self, item_id: &ItemId) {
        self.items.write().await.remove(item_id);
    }

    /// Returns the stock of an item.
    pub async fn stock(&self, item_id: &ItemId) -> Option<u32> {
        self.items
            .read()
            .await
            .get(item_id)
            .map(|item| item.available_quantity)
    }

    /// Sets the stock of an existing item.
    pub async fn set_stock(&self, item_id: &ItemId, quantity: u32) {
        if let Some(item) = self.items.write().await.get_mut(item_id) {
            item.available_quantity = quantity;
        }
    }

    /// Sets the price of an existing item.
    pub async fn set_price(&self, item_id: &ItemId, price: Money) {
        if let Some(item) = self.items.write().await.get_mut(item_id) {
            item.price = price;
        }
    }

    /// Marks an existing item active or inactive.
    pub async fn set_active(&self, item_id: &ItemId, active: bool) {
        if let Some(item) = self.items.write().await.get_mut(item_id) {
            item.active = active;
        }
    }

    /// Returns the number of items.
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    /// Returns true if the catalog has no items.
    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn get_item(&self, item_id: &ItemId) -> Result<Option<CatalogItem>, CatalogError> {
        Ok(self.items.read().await.get(item_id).cloned())
    }

    async fn decrement_stock(&self, item_id: &ItemId, quantity: u32) -> Result<u32, CatalogError> {
        let mut items = self.items.write().await;
        let item = items
            .get_mut(item_id)
            .ok_or_else(|| CatalogError::ItemNotFound {
                item_id: item_id.to_string(),
            })?;

        if item.available_quantity < quantity {
            return Err(CatalogError::InsufficientStock {
                item_id: item_id.to_string(),
                available: item.available_quantity,
                requested: quantity,
            });
        }

        item.available_quantity -= quantity;
        Ok(item.available_quantity)
    }

    async fn increment_stock(&self, item_id: &ItemId, quantity: u32) -> Result<u32, CatalogError> {
        let mut items = self.items.write().await;
        let item = items
            .get_mut(item_id)
            .ok_or_else(|| CatalogError::ItemNotFound {
                item_id: item_id.to_string(),
            })?;

        item.available_quantity = item.available_quantity.saturating_add(quantity);
        Ok(item.available_quantity)
    }
}
