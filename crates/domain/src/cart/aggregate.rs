//! Cart aggregate implementation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{CartId, OrderId, OwnerId, Version};
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::catalog::{CatalogItem, CheckoutViolation};
use crate::value_objects::{CartLine, ItemId, Money};

use super::{
    CartError, CartEvent, CartStatus,
    events::{CartOpenedData, CartSettledData, LineQuantityChangedData},
};

/// Cart aggregate root.
///
/// The owner's mutable working set of lines. At most one cart per owner is
/// Active at a time; settled and abandoned carts are retained for history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    /// Unique cart identifier.
    id: Option<CartId>,

    /// Current version for optimistic concurrency.
    #[serde(default)]
    version: Version,

    /// Owner of the cart.
    owner_id: Option<OwnerId>,

    /// Current status of the cart.
    status: CartStatus,

    /// Lines in insertion order, unique by item.
    lines: Vec<CartLine>,

    /// Sum of all line totals.
    total: Money,

    /// When the cart was opened.
    opened_at: Option<DateTime<Utc>>,

    /// Order whose payment settled this cart.
    settled_order_id: Option<OrderId>,

    /// When the cart left the Active status.
    closed_at: Option<DateTime<Utc>>,
}

/// Aggregate counts for an owner's active cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CartSummary {
    /// Sum of quantities over all lines.
    pub total_items: u32,

    /// Number of distinct items.
    pub unique_items: usize,

    /// Cart total.
    pub total: Money,
}

impl Aggregate for Cart {
    type Id = CartId;
    type Event = CartEvent;
    type Error = CartError;

    fn aggregate_type() -> &'static str {
        "Cart"
    }

    fn id(&self) -> Option<CartId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            CartEvent::CartOpened(data) => self.apply_cart_opened(data),
            CartEvent::LineAdded(data) => self.lines.push(data.line),
            CartEvent::LineQuantityChanged(data) => self.apply_line_quantity_changed(data),
            CartEvent::LineRemoved(data) => self.lines.retain(|l| l.item_id != data.item_id),
            CartEvent::CartCleared(_) => self.lines.clear(),
            CartEvent::CartSettled(data) => self.apply_cart_settled(data),
            CartEvent::CartAbandoned(data) => {
                self.status = CartStatus::Abandoned;
                self.closed_at = Some(data.abandoned_at);
            }
        }
        self.recompute_total();
    }
}

// Query methods
impl Cart {
    /// Returns the owner ID.
    pub fn owner_id(&self) -> Option<OwnerId> {
        self.owner_id
    }

    /// Returns true if the cart belongs to the given owner.
    pub fn is_owned_by(&self, owner_id: OwnerId) -> bool {
        self.owner_id == Some(owner_id)
    }

    /// Returns the current status.
    pub fn status(&self) -> CartStatus {
        self.status
    }

    /// Returns true if the cart is Active.
    pub fn is_active(&self) -> bool {
        self.status == CartStatus::Active
    }

    /// Returns the lines in insertion order.
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Returns the line for an item.
    pub fn get_line(&self, item_id: &ItemId) -> Option<&CartLine> {
        self.lines.iter().find(|l| &l.item_id == item_id)
    }

    /// Returns true if the cart has lines.
    pub fn has_lines(&self) -> bool {
        !self.lines.is_empty()
    }

    /// Returns the total quantity of all lines.
    pub fn total_quantity(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Returns the cart total.
    pub fn total(&self) -> Money {
        self.total
    }

    /// Returns when the cart was opened.
    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        self.opened_at
    }

    /// Returns the order that settled this cart.
    pub fn settled_order_id(&self) -> Option<OrderId> {
        self.settled_order_id
    }

    /// Returns when the cart was settled or abandoned.
    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    /// Returns item and money counts for display.
    pub fn summary(&self) -> CartSummary {
        CartSummary {
            total_items: self.total_quantity(),
            unique_items: self.lines.len(),
            total: self.total,
        }
    }

    /// Re-checks every line against current catalog snapshots.
    ///
    /// `catalog` holds the snapshot of every item the catalog still knows;
    /// items absent from it are reported as missing. A line may yield more
    /// than one violation (stock and price are checked independently).
    pub fn checkout_violations(
        &self,
        catalog: &HashMap<ItemId, CatalogItem>,
        price_epsilon: Money,
    ) -> Vec<CheckoutViolation> {
        if self.lines.is_empty() {
            return vec![CheckoutViolation::EmptyCart];
        }

        let mut violations = Vec::new();
        for line in &self.lines {
            let Some(item) = catalog.get(&line.item_id) else {
                violations.push(CheckoutViolation::ItemMissing {
                    item_id: line.item_id.clone(),
                });
                continue;
            };

            if !item.active {
                violations.push(CheckoutViolation::ItemUnavailable {
                    item_id: line.item_id.clone(),
                    title: item.title.clone(),
                });
                continue;
            }

            if item.available_quantity < line.quantity {
                violations.push(CheckoutViolation::InsufficientStock {
                    item_id: line.item_id.clone(),
                    title: item.title.clone(),
                    available: item.available_quantity,
                    requested: line.quantity,
                });
            }

            if item.price.abs_diff(line.unit_price) > price_epsilon {
                violations.push(CheckoutViolation::PriceChanged {
                    item_id: line.item_id.clone(),
                    title: item.title.clone(),
                    captured: line.unit_price,
                    current: item.price,
                });
            }
        }
        violations
    }
}

// Command methods (return events)
impl Cart {
    /// Opens a new active cart for an owner.
    pub fn open(&self, cart_id: CartId, owner_id: OwnerId) -> Result<Vec<CartEvent>, CartError> {
        if self.id.is_some() {
            return Err(CartError::AlreadyOpened);
        }

        Ok(vec![CartEvent::cart_opened(cart_id, owner_id)])
    }

    /// Adds `quantity` units of a catalog item.
    ///
    /// If the item is already in the cart the quantities are merged and the
    /// originally captured unit price is kept.
    pub fn add_line(&self, item: &CatalogItem, quantity: u32) -> Result<Vec<CartEvent>, CartError> {
        self.ensure_active("add line")?;

        if quantity == 0 {
            return Err(CartError::InvalidQuantity { quantity });
        }

        if !item.active {
            return Err(CartError::ItemUnavailable {
                item_id: item.item_id.to_string(),
                title: item.title.clone(),
            });
        }

        let existing = self.get_line(&item.item_id).map_or(0, |l| l.quantity);
        let requested = existing
            .checked_add(quantity)
            .ok_or_else(|| insufficient_stock(item, u32::MAX))?;
        ensure_stock(item, requested)?;

        if existing > 0 {
            Ok(vec![CartEvent::line_quantity_changed(
                item.item_id.clone(),
                existing,
                requested,
            )])
        } else {
            Ok(vec![CartEvent::line_added(CartLine::new(
                item.item_id.clone(),
                quantity,
                item.price,
            ))])
        }
    }

    /// Sets the quantity of an existing line, re-checking availability.
    pub fn update_line_quantity(
        &self,
        item: &CatalogItem,
        quantity: u32,
    ) -> Result<Vec<CartEvent>, CartError> {
        self.ensure_active("update line quantity")?;

        if quantity == 0 {
            return Err(CartError::InvalidQuantity { quantity });
        }

        let existing = self
            .get_line(&item.item_id)
            .ok_or_else(|| CartError::LineNotFound {
                item_id: item.item_id.to_string(),
            })?;

        if existing.quantity == quantity {
            return Ok(vec![]);
        }

        ensure_stock(item, quantity)?;

        Ok(vec![CartEvent::line_quantity_changed(
            item.item_id.clone(),
            existing.quantity,
            quantity,
        )])
    }

    /// Removes a line.
    pub fn remove_line(&self, item_id: &ItemId) -> Result<Vec<CartEvent>, CartError> {
        self.ensure_active("remove line")?;

        if self.get_line(item_id).is_none() {
            return Err(CartError::LineNotFound {
                item_id: item_id.to_string(),
            });
        }

        Ok(vec![CartEvent::line_removed(item_id.clone())])
    }

    /// Removes every line.
    pub fn clear(&self) -> Result<Vec<CartEvent>, CartError> {
        self.ensure_active("clear")?;

        if self.lines.is_empty() {
            return Ok(vec![]);
        }

        Ok(vec![CartEvent::cart_cleared(self.lines.len())])
    }

    /// Settles the cart once an order placed from it is paid.
    pub fn settle(&self, order_id: OrderId) -> Result<Vec<CartEvent>, CartError> {
        self.ensure_active("settle")?;

        Ok(vec![CartEvent::cart_settled(order_id)])
    }

    /// Abandons the cart, freeing the owner's active slot.
    pub fn abandon(&self) -> Result<Vec<CartEvent>, CartError> {
        self.ensure_active("abandon")?;

        Ok(vec![CartEvent::cart_abandoned()])
    }

    fn ensure_active(&self, action: &'static str) -> Result<(), CartError> {
        if !self.status.can_modify_lines() {
            return Err(CartError::NotActive {
                status: self.status,
                action,
            });
        }
        Ok(())
    }
}

fn ensure_stock(item: &CatalogItem, requested: u32) -> Result<(), CartError> {
    if requested > item.available_quantity {
        return Err(insufficient_stock(item, requested));
    }
    Ok(())
}

fn insufficient_stock(item: &CatalogItem, requested: u32) -> CartError {
    CartError::InsufficientStock {
        item_id: item.item_id.to_string(),
        title: item.title.clone(),
        available: item.available_quantity,
        requested,
    }
}

// Apply event helpers
impl Cart {
    fn apply_cart_opened(&mut self, data: CartOpenedData) {
        self.id = Some(data.cart_id);
        self.owner_id = Some(data.owner_id);
        self.status = CartStatus::Active;
        self.opened_at = Some(data.opened_at);
    }

    fn apply_line_quantity_changed(&mut self, data: LineQuantityChangedData) {
        if let Some(line) = self.lines.iter_mut().find(|l| l.item_id == data.item_id) {
            line.quantity = data.new_quantity;
        }
    }

    fn apply_cart_settled(&mut self, data: CartSettledData) {
        self.status = CartStatus::Settled;
        self.settled_order_id = Some(data.order_id);
        self.closed_at = Some(data.settled_at);
    }

    fn recompute_total(&mut self) {
        self.total = self.lines.iter().map(CartLine::line_total).sum();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::DomainEvent;

    fn book(id: &str, cents: i64, stock: u32) -> CatalogItem {
        CatalogItem::new(id, format!("Book {id}"), Money::from_cents(cents), stock)
    }

    fn open_cart() -> (Cart, OwnerId) {
        let mut cart = Cart::default();
        let owner = OwnerId::new();
        let events = cart.open(CartId::new(), owner).unwrap();
        cart.apply_events(events);
        (cart, owner)
    }

    #[test]
    fn test_open_cart() {
        let (cart, owner) = open_cart();
        assert!(cart.id().is_some());
        assert!(cart.is_owned_by(owner));
        assert!(!cart.is_owned_by(OwnerId::new()));
        assert_eq!(cart.status(), CartStatus::Active);
        assert!(!cart.has_lines());
        assert!(cart.opened_at().is_some());
    }

    #[test]
    fn test_open_twice_fails() {
        let (cart, _) = open_cart();
        let result = cart.open(CartId::new(), OwnerId::new());
        assert!(matches!(result, Err(CartError::AlreadyOpened)));
    }

    #[test]
    fn test_add_line_and_total() {
        let (mut cart, _) = open_cart();
        cart.apply_events(cart.add_line(&book("A", 1000, 5), 2).unwrap());
        cart.apply_events(cart.add_line(&book("B", 250, 5), 1).unwrap());

        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.total().cents(), 2250);
        assert_eq!(cart.lines()[0].item_id, ItemId::new("A"));
    }

    #[test]
    fn test_add_same_item_merges_and_keeps_captured_price() {
        let (mut cart, _) = open_cart();
        cart.apply_events(cart.add_line(&book("A", 1000, 10), 2).unwrap());

        let repriced = book("A", 1200, 10);
        let events = cart.add_line(&repriced, 3).unwrap();
        assert_eq!(events[0].event_type(), "LineQuantityChanged");
        cart.apply_events(events);

        let line = cart.get_line(&ItemId::new("A")).unwrap();
        assert_eq!(line.quantity, 5);
        assert_eq!(line.unit_price.cents(), 1000);
        assert_eq!(cart.total().cents(), 5000);
    }

    #[test]
    fn test_add_zero_quantity_fails() {
        let (cart, _) = open_cart();
        let err = cart.add_line(&book("A", 1000, 5), 0).unwrap_err();
        assert!(matches!(err, CartError::InvalidQuantity { quantity: 0 }));
        assert_eq!(err.kind(), crate::ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_add_inactive_item_fails() {
        let (cart, _) = open_cart();
        let err = cart.add_line(&book("A", 1000, 5).inactive(), 1).unwrap_err();
        assert!(matches!(err, CartError::ItemUnavailable { .. }));
        assert_eq!(err.kind(), crate::ErrorKind::FailedPrecondition);
    }

    #[test]
    fn test_add_counts_existing_quantity_against_stock() {
        let (mut cart, _) = open_cart();
        let item = book("A", 1000, 3);
        cart.apply_events(cart.add_line(&item, 2).unwrap());

        let err = cart.add_line(&item, 2).unwrap_err();
        assert!(matches!(
            err,
            CartError::InsufficientStock {
                available: 3,
                requested: 4,
                ..
            }
        ));
    }

    #[test]
    fn test_add_quantity_overflow_is_rejected() {
        let (mut cart, _) = open_cart();
        let item = book("A", 1000, u32::MAX);
        cart.apply_events(cart.add_line(&item, 1).unwrap());

        let err = cart.add_line(&item, u32::MAX).unwrap_err();
        assert!(matches!(
            err,
            CartError::InsufficientStock {
                requested: u32::MAX,
                ..
            }
        ));
        assert_eq!(err.kind(), crate::ErrorKind::FailedPrecondition);
        assert_eq!(cart.get_line(&ItemId::new("A")).unwrap().quantity, 1);
        assert_eq!(cart.total().cents(), 1000);
    }

    #[test]
    fn test_update_quantity() {
        let (mut cart, _) = open_cart();
        let item = book("A", 1000, 10);
        cart.apply_events(cart.add_line(&item, 2).unwrap());
        cart.apply_events(cart.update_line_quantity(&item, 7).unwrap());

        assert_eq!(cart.total_quantity(), 7);
        assert_eq!(cart.total().cents(), 7000);
    }

    #[test]
    fn test_update_quantity_same_value_is_noop() {
        let (mut cart, _) = open_cart();
        let item = book("A", 1000, 10);
        cart.apply_events(cart.add_line(&item, 2).unwrap());
        assert!(cart.update_line_quantity(&item, 2).unwrap().is_empty());
    }

    #[test]
    fn test_update_quantity_rejects_zero_and_overstock() {
        let (mut cart, _) = open_cart();
        let item = book("A", 1000, 3);
        cart.apply_events(cart.add_line(&item, 1).unwrap());

        assert!(matches!(
            cart.update_line_quantity(&item, 0),
            Err(CartError::InvalidQuantity { .. })
        ));
        assert!(matches!(
            cart.update_line_quantity(&item, 4),
            Err(CartError::InsufficientStock { .. })
        ));
    }

    #[test]
    fn test_update_missing_line_fails() {
        let (cart, _) = open_cart();
        let err = cart.update_line_quantity(&book("Z", 100, 1), 1).unwrap_err();
        assert!(matches!(err, CartError::LineNotFound { .. }));
        assert_eq!(err.kind(), crate::ErrorKind::NotFound);
    }

    #[test]
    fn test_remove_and_clear() {
        let (mut cart, _) = open_cart();
        cart.apply_events(cart.add_line(&book("A", 1000, 5), 1).unwrap());
        cart.apply_events(cart.add_line(&book("B", 500, 5), 2).unwrap());

        cart.apply_events(cart.remove_line(&ItemId::new("A")).unwrap());
        assert_eq!(cart.total().cents(), 1000);

        cart.apply_events(cart.clear().unwrap());
        assert!(!cart.has_lines());
        assert_eq!(cart.total(), Money::zero());
        assert!(cart.clear().unwrap().is_empty());
    }

    #[test]
    fn test_remove_missing_line_fails() {
        let (cart, _) = open_cart();
        assert!(matches!(
            cart.remove_line(&ItemId::new("nope")),
            Err(CartError::LineNotFound { .. })
        ));
    }

    #[test]
    fn test_settled_cart_rejects_mutation() {
        let (mut cart, _) = open_cart();
        let item = book("A", 1000, 5);
        cart.apply_events(cart.add_line(&item, 1).unwrap());

        let order_id = OrderId::new();
        cart.apply_events(cart.settle(order_id).unwrap());
        assert_eq!(cart.status(), CartStatus::Settled);
        assert_eq!(cart.settled_order_id(), Some(order_id));
        assert!(cart.closed_at().is_some());

        let err = cart.add_line(&item, 1).unwrap_err();
        assert!(matches!(err, CartError::NotActive { .. }));
        assert_eq!(err.kind(), crate::ErrorKind::FailedPrecondition);
        assert!(cart.settle(OrderId::new()).is_err());
        assert!(cart.abandon().is_err());
    }

    #[test]
    fn test_abandon() {
        let (mut cart, _) = open_cart();
        cart.apply_events(cart.abandon().unwrap());
        assert_eq!(cart.status(), CartStatus::Abandoned);
        assert!(cart.clear().is_err());
    }

    #[test]
    fn test_total_is_exact_sum_after_every_mutation() {
        let (mut cart, _) = open_cart();
        let a = book("A", 333, 100);
        let b = book("B", 1999, 100);

        fn assert_exact(cart: &Cart) {
            let expected: i64 = cart
                .lines()
                .iter()
                .map(|l| l.unit_price.cents() * i64::from(l.quantity))
                .sum();
            assert_eq!(cart.total().cents(), expected);
        }

        cart.apply_events(cart.add_line(&a, 3).unwrap());
        assert_exact(&cart);
        cart.apply_events(cart.add_line(&b, 1).unwrap());
        assert_exact(&cart);
        cart.apply_events(cart.add_line(&a, 4).unwrap());
        assert_exact(&cart);
        cart.apply_events(cart.update_line_quantity(&b, 9).unwrap());
        assert_exact(&cart);
        cart.apply_events(cart.remove_line(&ItemId::new("A")).unwrap());
        assert_exact(&cart);
        cart.apply_events(cart.add_line(&a, 1).unwrap());
        assert_exact(&cart);
        assert_eq!(cart.total().cents(), 333 + 9 * 1999);
    }

    #[test]
    fn test_summary() {
        let (mut cart, _) = open_cart();
        cart.apply_events(cart.add_line(&book("A", 1000, 5), 2).unwrap());
        cart.apply_events(cart.add_line(&book("B", 500, 5), 3).unwrap());

        let summary = cart.summary();
        assert_eq!(summary.total_items, 5);
        assert_eq!(summary.unique_items, 2);
        assert_eq!(summary.total.cents(), 3500);
    }

    #[test]
    fn test_checkout_violations_empty_cart() {
        let (cart, _) = open_cart();
        let violations = cart.checkout_violations(&HashMap::new(), Money::from_cents(1));
        assert_eq!(violations, vec![CheckoutViolation::EmptyCart]);
    }

    #[test]
    fn test_checkout_violations_reports_only_short_item() {
        let (mut cart, _) = open_cart();
        let a = book("A", 1000, 5);
        let b = book("B", 500, 1);
        cart.apply_events(cart.add_line(&a, 2).unwrap());
        cart.apply_events(cart.add_line(&b, 1).unwrap());

        let mut catalog = HashMap::new();
        catalog.insert(a.item_id.clone(), a);
        catalog.insert(b.item_id.clone(), book("B", 500, 0));

        let violations = cart.checkout_violations(&catalog, Money::from_cents(1));
        assert_eq!(violations.len(), 1);
        assert!(matches!(
            &violations[0],
            CheckoutViolation::InsufficientStock { item_id, available: 0, requested: 1, .. }
                if item_id == &ItemId::new("B")
        ));
    }

    #[test]
    fn test_checkout_violations_missing_inactive_and_price_drift() {
        let (mut cart, _) = open_cart();
        cart.apply_events(cart.add_line(&book("A", 1000, 5), 1).unwrap());
        cart.apply_events(cart.add_line(&book("B", 1000, 5), 1).unwrap());
        cart.apply_events(cart.add_line(&book("C", 1000, 5), 1).unwrap());
        cart.apply_events(cart.add_line(&book("D", 1000, 5), 1).unwrap());

        let mut catalog = HashMap::new();
        catalog.insert(ItemId::new("B"), book("B", 1000, 5).inactive());
        catalog.insert(ItemId::new("C"), book("C", 1001, 5));
        catalog.insert(ItemId::new("D"), book("D", 1002, 5));

        let violations = cart.checkout_violations(&catalog, Money::from_cents(1));
        assert_eq!(violations.len(), 3);
        assert!(matches!(violations[0], CheckoutViolation::ItemMissing { .. }));
        assert!(matches!(violations[1], CheckoutViolation::ItemUnavailable { .. }));
        assert!(matches!(
            violations[2],
            CheckoutViolation::PriceChanged { .. }
        ));
    }

    #[test]
    fn test_serialization() {
        let (mut cart, owner) = open_cart();
        cart.apply_events(cart.add_line(&book("A", 1000, 5), 2).unwrap());
        cart.set_version(Version::new(3));

        let json = serde_json::to_string(&cart).unwrap();
        let restored: Cart = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.id(), cart.id());
        assert!(restored.is_owned_by(owner));
        assert_eq!(restored.total().cents(), 2000);
        assert_eq!(restored.version(), Version::new(3));
    }
}
