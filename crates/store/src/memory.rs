use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CartId, OrderId, OwnerId, Version};
use domain::{Aggregate, Cart, CartStatus, Order, OrderStatus};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{ACTIVE_CART_CONSTRAINT, CartStore, ORDER_NUMBER_CONSTRAINT, OrderStore},
};

/// A stored aggregate together with its insertion sequence number.
#[derive(Clone)]
struct Row<A> {
    seq: u64,
    state: A,
}

#[derive(Default)]
struct Tables {
    carts: HashMap<CartId, Row<Cart>>,
    orders: HashMap<OrderId, Row<Order>>,
    seq: u64,
}

impl Tables {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }
}

/// In-memory store implementation for tests and local runs.
///
/// Both tables live behind one lock, so constraint checks and the write they
/// guard are atomic, matching the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored carts.
    pub async fn cart_count(&self) -> usize {
        self.tables.read().await.carts.len()
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    /// Clears all carts and orders.
    pub async fn clear(&self) {
        let mut tables = self.tables.write().await;
        tables.carts.clear();
        tables.orders.clear();
    }
}

fn require_id<A: Aggregate>(aggregate: &A) -> Result<A::Id> {
    aggregate.id().ok_or(StoreError::Uninitialized {
        aggregate_type: A::aggregate_type(),
    })
}

fn conflict<A: Aggregate>(id: impl Into<Uuid>, expected: Version, actual: Version) -> StoreError {
    metrics::counter!("store_version_conflicts_total", "aggregate" => A::aggregate_type())
        .increment(1);
    StoreError::ConcurrencyConflict {
        aggregate_type: A::aggregate_type(),
        aggregate_id: id.into(),
        expected,
        actual,
    }
}

fn newest_first<A: Clone>(mut rows: Vec<&Row<A>>) -> Vec<A> {
    rows.sort_by(|a, b| b.seq.cmp(&a.seq));
    rows.into_iter().map(|row| row.state.clone()).collect()
}

fn other_active_cart(tables: &Tables, cart: &Cart, cart_id: CartId) -> bool {
    cart.is_active()
        && tables.carts.values().any(|row| {
            row.state.id() != Some(cart_id)
                && row.state.status() == CartStatus::Active
                && row.state.owner_id() == cart.owner_id()
        })
}

#[async_trait]
impl CartStore for InMemoryStore {
    async fn insert_cart(&self, cart: &Cart) -> Result<Version> {
        let cart_id = require_id(cart)?;
        let mut tables = self.tables.write().await;

        if let Some(existing) = tables.carts.get(&cart_id) {
            return Err(conflict::<Cart>(
                cart_id,
                Version::initial(),
                existing.state.version(),
            ));
        }

        if other_active_cart(&tables, cart, cart_id) {
            return Err(StoreError::UniqueViolation {
                constraint: ACTIVE_CART_CONSTRAINT.to_string(),
            });
        }

        let mut state = cart.clone();
        state.set_version(Version::first());
        let seq = tables.next_seq();
        tables.carts.insert(cart_id, Row { seq, state });

        Ok(Version::first())
    }

    async fn update_cart(&self, cart: &Cart, expected: Version) -> Result<Version> {
        let cart_id = require_id(cart)?;
        let mut tables = self.tables.write().await;

        let actual = tables
            .carts
            .get(&cart_id)
            .map(|row| row.state.version())
            .ok_or(StoreError::NotFound {
                aggregate_type: Cart::aggregate_type(),
                aggregate_id: cart_id.into(),
            })?;

        if actual != expected {
            return Err(conflict::<Cart>(cart_id, expected, actual));
        }

        if other_active_cart(&tables, cart, cart_id) {
            return Err(StoreError::UniqueViolation {
                constraint: ACTIVE_CART_CONSTRAINT.to_string(),
            });
        }

        let new_version = expected.next();
        if let Some(row) = tables.carts.get_mut(&cart_id) {
            row.state = cart.clone();
            row.state.set_version(new_version);
        }

        Ok(new_version)
    }

    async fn get_cart(&self, cart_id: CartId) -> Result<Option<Cart>> {
        let tables = self.tables.read().await;
        Ok(tables.carts.get(&cart_id).map(|row| row.state.clone()))
    }

    async fn find_active_cart(&self, owner_id: OwnerId) -> Result<Option<Cart>> {
        let tables = self.tables.read().await;
        Ok(tables
            .carts
            .values()
            .find(|row| row.state.is_owned_by(owner_id) && row.state.is_active())
            .map(|row| row.state.clone()))
    }

    async fn list_carts(&self, owner_id: OwnerId) -> Result<Vec<Cart>> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables
                .carts
                .values()
                .filter(|row| row.state.is_owned_by(owner_id))
                .collect(),
        ))
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<Version> {
        let order_id = require_id(order)?;
        let mut tables = self.tables.write().await;

        if let Some(existing) = tables.orders.get(&order_id) {
            return Err(conflict::<Order>(
                order_id,
                Version::initial(),
                existing.state.version(),
            ));
        }

        let number_taken = tables
            .orders
            .values()
            .any(|row| row.state.order_number() == order.order_number());
        if number_taken {
            return Err(StoreError::UniqueViolation {
                constraint: ORDER_NUMBER_CONSTRAINT.to_string(),
            });
        }

        let mut state = order.clone();
        state.set_version(Version::first());
        let seq = tables.next_seq();
        tables.orders.insert(order_id, Row { seq, state });

        Ok(Version::first())
    }

    async fn update_order(&self, order: &Order, expected: Version) -> Result<Version> {
        let order_id = require_id(order)?;
        let mut tables = self.tables.write().await;

        let row = tables
            .orders
            .get_mut(&order_id)
            .ok_or(StoreError::NotFound {
                aggregate_type: Order::aggregate_type(),
                aggregate_id: order_id.into(),
            })?;

        let actual = row.state.version();
        if actual != expected {
            return Err(conflict::<Order>(order_id, expected, actual));
        }

        let new_version = expected.next();
        row.state = order.clone();
        row.state.set_version(new_version);

        Ok(new_version)
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let tables = self.tables.read().await;
        Ok(tables.orders.get(&order_id).map(|row| row.state.clone()))
    }

    async fn find_by_authorization(&self, authorization_id: &str) -> Result<Option<Order>> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .values()
            .find(|row| row.state.has_authorization(authorization_id))
            .map(|row| row.state.clone()))
    }

    async fn find_pending_for_cart(&self, cart_id: CartId) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables
                .orders
                .values()
                .filter(|row| {
                    row.state.cart_id() == Some(cart_id)
                        && row.state.status() == OrderStatus::Pending
                })
                .collect(),
        ))
    }

    async fn list_orders(&self, owner_id: OwnerId) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables
                .orders
                .values()
                .filter(|row| row.state.is_owned_by(owner_id))
                .collect(),
        ))
    }

    async fn list_pending_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<_> = tables
            .orders
            .values()
            .filter(|row| {
                row.state.status() == OrderStatus::Pending
                    && row.state.placed_at().is_some_and(|at| at < cutoff)
            })
            .collect();
        rows.sort_by_key(|row| row.seq);
        Ok(rows.into_iter().map(|row| row.state.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{CartLine, Money, OrderLine, OrderNumber};

    fn open_cart(owner_id: OwnerId) -> Cart {
        let mut cart = Cart::default();
        cart.apply_events(cart.open(CartId::new(), owner_id).unwrap());
        cart
    }

    fn place_order(cart_id: CartId, number: &str) -> Order {
        let line = CartLine::new("A", 1, Money::from_cents(1000));
        let mut order = Order::default();
        let events = order
            .place(
                OrderId::new(),
                OrderNumber::new(number),
                OwnerId::new(),
                cart_id,
                vec![OrderLine {
                    item_id: line.item_id.clone(),
                    title: "Book A".into(),
                    author: String::new(),
                    isbn: String::new(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    line_total: line.line_total(),
                }],
            )
            .unwrap();
        order.apply_events(events);
        order
    }

    #[tokio::test]
    async fn test_insert_and_get_cart() {
        let store = InMemoryStore::new();
        let owner = OwnerId::new();
        let cart = open_cart(owner);

        let version = store.insert_cart(&cart).await.unwrap();
        assert_eq!(version, Version::first());

        let loaded = store.get_cart(cart.id().unwrap()).await.unwrap().unwrap();
        assert_eq!(loaded.version(), Version::first());

        let active = store.find_active_cart(owner).await.unwrap().unwrap();
        assert_eq!(active.id(), cart.id());
        assert_eq!(store.cart_count().await, 1);
    }

    #[tokio::test]
    async fn test_second_active_cart_rejected() {
        let store = InMemoryStore::new();
        let owner = OwnerId::new();
        store.insert_cart(&open_cart(owner)).await.unwrap();

        let err = store.insert_cart(&open_cart(owner)).await.unwrap_err();
        assert!(err.is_unique_violation(ACTIVE_CART_CONSTRAINT));

        // A different owner is unaffected
        store.insert_cart(&open_cart(OwnerId::new())).await.unwrap();
    }

    #[tokio::test]
    async fn test_new_active_cart_allowed_after_abandon() {
        let store = InMemoryStore::new();
        let owner = OwnerId::new();
        let mut cart = open_cart(owner);
        let version = store.insert_cart(&cart).await.unwrap();

        cart.apply_events(cart.abandon().unwrap());
        store.update_cart(&cart, version).await.unwrap();

        store.insert_cart(&open_cart(owner)).await.unwrap();
        assert_eq!(store.list_carts(owner).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_cart_version_check() {
        let store = InMemoryStore::new();
        let cart = open_cart(OwnerId::new());
        store.insert_cart(&cart).await.unwrap();

        let v2 = store.update_cart(&cart, Version::first()).await.unwrap();
        assert_eq!(v2, Version::new(2));

        let err = store.update_cart(&cart, Version::first()).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::ConcurrencyConflict {
                expected,
                actual,
                ..
            } if expected == Version::first() && actual == Version::new(2)
        ));
    }

    #[tokio::test]
    async fn test_update_missing_cart_is_not_found() {
        let store = InMemoryStore::new();
        let err = store
            .update_cart(&open_cart(OwnerId::new()), Version::first())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_uninitialized_aggregate_rejected() {
        let store = InMemoryStore::new();
        let err = store.insert_cart(&Cart::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::Uninitialized { .. }));
    }

    #[tokio::test]
    async fn test_list_carts_newest_first() {
        let store = InMemoryStore::new();
        let owner = OwnerId::new();

        let mut first = open_cart(owner);
        let v = store.insert_cart(&first).await.unwrap();
        first.apply_events(first.abandon().unwrap());
        store.update_cart(&first, v).await.unwrap();

        let second = open_cart(owner);
        store.insert_cart(&second).await.unwrap();

        let carts = store.list_carts(owner).await.unwrap();
        assert_eq!(carts[0].id(), second.id());
        assert_eq!(carts[1].id(), first.id());
    }

    #[tokio::test]
    async fn test_order_number_unique() {
        let store = InMemoryStore::new();
        store
            .insert_order(&place_order(CartId::new(), "ORD-1-aaaaaa"))
            .await
            .unwrap();

        let err = store
            .insert_order(&place_order(CartId::new(), "ORD-1-aaaaaa"))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation(ORDER_NUMBER_CONSTRAINT));
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_find_by_authorization_and_pending_for_cart() {
        let store = InMemoryStore::new();
        let cart_id = CartId::new();
        let mut order = place_order(cart_id, "ORD-2-bbbbbb");
        let v = store.insert_order(&order).await.unwrap();

        order.apply_events(order.attach_authorization("pi_42").unwrap());
        let v = store.update_order(&order, v).await.unwrap();

        let found = store.find_by_authorization("pi_42").await.unwrap().unwrap();
        assert_eq!(found.id(), order.id());
        assert_eq!(found.version(), v);
        assert!(store.find_by_authorization("pi_0").await.unwrap().is_none());

        order.apply_events(order.attach_authorization("pi_43").unwrap());
        let v = store.update_order(&order, v).await.unwrap();
        for authorization_id in ["pi_42", "pi_43"] {
            let found = store.find_by_authorization(authorization_id).await.unwrap().unwrap();
            assert_eq!(found.id(), order.id());
        }

        assert_eq!(store.find_pending_for_cart(cart_id).await.unwrap().len(), 1);

        order.apply_events(order.cancel("test").unwrap());
        store.update_order(&order, v).await.unwrap();
        assert!(store.find_pending_for_cart(cart_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_pending_before_cutoff() {
        let store = InMemoryStore::new();
        let order = place_order(CartId::new(), "ORD-3-cccccc");
        store.insert_order(&order).await.unwrap();

        let past = Utc::now() - chrono::Duration::hours(1);
        assert!(store.list_pending_before(past).await.unwrap().is_empty());

        let future = Utc::now() + chrono::Duration::seconds(1);
        assert_eq!(store.list_pending_before(future).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let store = InMemoryStore::new();
        store.insert_cart(&open_cart(OwnerId::new())).await.unwrap();
        store.clear().await;
        assert_eq!(store.cart_count().await, 0);
    }
}
