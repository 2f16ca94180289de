use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CartId, OrderId, OwnerId, Version};
use domain::{Cart, Order};

use crate::Result;

/// Name of the constraint allowing one Active cart per owner.
pub const ACTIVE_CART_CONSTRAINT: &str = "carts_one_active_per_owner";

/// Name of the constraint keeping order numbers unique.
pub const ORDER_NUMBER_CONSTRAINT: &str = "orders_order_number_key";

/// Persistence port for carts.
///
/// All implementations must be thread-safe (Send + Sync). Returned carts carry
/// their stored version.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Inserts a newly opened cart at [`Version::first`].
    ///
    /// Fails with `UniqueViolation` on [`ACTIVE_CART_CONSTRAINT`] if the owner
    /// already has an Active cart.
    async fn insert_cart(&self, cart: &Cart) -> Result<Version>;

    /// Replaces the stored cart if its version still equals `expected`.
    ///
    /// Returns the new version (`expected + 1`), or `ConcurrencyConflict`
    /// if another writer got there first.
    async fn update_cart(&self, cart: &Cart, expected: Version) -> Result<Version>;

    /// Loads a cart by id.
    async fn get_cart(&self, cart_id: CartId) -> Result<Option<Cart>>;

    /// Loads the owner's Active cart, if any.
    async fn find_active_cart(&self, owner_id: OwnerId) -> Result<Option<Cart>>;

    /// Lists every cart of an owner, newest first.
    async fn list_carts(&self, owner_id: OwnerId) -> Result<Vec<Cart>>;
}

/// Persistence port for orders.
///
/// All implementations must be thread-safe (Send + Sync). Returned orders
/// carry their stored version.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts a newly placed order at [`Version::first`].
    ///
    /// Fails with `UniqueViolation` on [`ORDER_NUMBER_CONSTRAINT`] if the
    /// order number is taken.
    async fn insert_order(&self, order: &Order) -> Result<Version>;

    /// Replaces the stored order if its version still equals `expected`.
    async fn update_order(&self, order: &Order, expected: Version) -> Result<Version>;

    /// Loads an order by id.
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Loads the order any of whose issued authorizations is `authorization_id`.
    async fn find_by_authorization(&self, authorization_id: &str) -> Result<Option<Order>>;

    /// Lists Pending orders placed from a cart, newest first.
    async fn find_pending_for_cart(&self, cart_id: CartId) -> Result<Vec<Order>>;

    /// Lists every order of an owner, newest first.
    async fn list_orders(&self, owner_id: OwnerId) -> Result<Vec<Order>>;

    /// Lists Pending orders placed strictly before `cutoff`, oldest first.
    async fn list_pending_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>>;
}
