//! Catalog seeding for the in-memory catalog.

use std::path::Path;

use checkout::InMemoryCatalog;
use domain::{CatalogItem, Money};
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading a catalog seed file.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read catalog seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid catalog seed file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid catalog entry {item_id}: {reason}")]
    InvalidEntry { item_id: String, reason: String },
}

/// One entry of a catalog seed file.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedItem {
    pub item_id: String,
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub isbn: String,
    pub price_cents: i64,
    pub stock: u32,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl SeedItem {
    fn into_catalog_item(self) -> Result<CatalogItem, SeedError> {
        if self.price_cents <= 0 {
            return Err(SeedError::InvalidEntry {
                item_id: self.item_id,
                reason: "price must be positive".to_string(),
            });
        }

        let mut item = CatalogItem::new(
            self.item_id,
            self.title,
            Money::from_cents(self.price_cents),
            self.stock,
        )
        .with_author(self.author)
        .with_isbn(self.isbn);
        if !self.active {
            item = item.inactive();
        }
        Ok(item)
    }
}

/// Parses a JSON array of seed items into a catalog.
pub fn parse_catalog(json: &[u8]) -> Result<InMemoryCatalog, SeedError> {
    let entries: Vec<SeedItem> = serde_json::from_slice(json)?;
    let items = entries
        .into_iter()
        .map(SeedItem::into_catalog_item)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(InMemoryCatalog::with_items(items))
}

/// Loads a catalog from a JSON seed file.
pub async fn load_catalog(path: &Path) -> Result<InMemoryCatalog, SeedError> {
    let bytes = tokio::fs::read(path).await?;
    let catalog = parse_catalog(&bytes)?;
    tracing::info!(path = %path.display(), items = catalog.len().await, "catalog seeded");
    Ok(catalog)
}

/// A small catalog for local runs without a seed file.
pub fn demo_catalog() -> InMemoryCatalog {
    InMemoryCatalog::with_items([
        CatalogItem::new("dune", "Dune", Money::from_cents(999), 25)
            .with_author("Frank Herbert")
            .with_isbn("9780441013593"),
        CatalogItem::new("neuromancer", "Neuromancer", Money::from_cents(1499), 10)
            .with_author("William Gibson")
            .with_isbn("9780441569595"),
        CatalogItem::new("hyperion", "Hyperion", Money::from_cents(1850), 3)
            .with_author("Dan Simmons")
            .with_isbn("9780553283686"),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkout::Catalog;
    use domain::ItemId;

    #[tokio::test]
    async fn test_parse_catalog() {
        let json = br#"[
            {"item_id": "A", "title": "Book A", "author": "Ann", "price_cents": 1000, "stock": 5},
            {"item_id": "B", "title": "Book B", "price_cents": 3999, "stock": 0, "active": false}
        ]"#;
        let catalog = parse_catalog(json).unwrap();

        assert_eq!(catalog.len().await, 2);
        let a = catalog.get_item(&ItemId::new("A")).await.unwrap().unwrap();
        assert_eq!(a.price, Money::from_cents(1000));
        assert_eq!(a.author, "Ann");
        assert!(a.active);

        let b = catalog.get_item(&ItemId::new("B")).await.unwrap().unwrap();
        assert!(!b.active);
        assert_eq!(b.available_quantity, 0);
    }

    #[test]
    fn test_non_positive_price_rejected() {
        let json = br#"[{"item_id": "F", "title": "Free", "price_cents": 0, "stock": 1}]"#;
        assert!(matches!(
            parse_catalog(json),
            Err(SeedError::InvalidEntry { .. })
        ));
    }

    #[test]
    fn test_malformed_seed_rejected() {
        assert!(matches!(parse_catalog(b"{"), Err(SeedError::Parse(_))));
    }

    #[tokio::test]
    async fn test_demo_catalog_has_stock() {
        let catalog = demo_catalog();
        assert_eq!(catalog.stock(&ItemId::new("hyperion")).await, Some(3));
    }
}
