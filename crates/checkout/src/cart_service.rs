//! Cart service providing the owner-facing cart API.

use std::collections::HashMap;

use common::{CartId, OwnerId};
use domain::{
    Aggregate, Cart, CartError, CartEvent, CartSummary, CatalogItem, CheckoutViolation, ItemId,
};
use store::{ACTIVE_CART_CONSTRAINT, CartStore};

use crate::command::CommandHandler;
use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, Result};
use crate::services::Catalog;

/// Service for managing an owner's active cart.
///
/// Every mutation works on the owner's single Active cart, created lazily.
/// Writes are version-checked; a mutation that loses a race is re-run
/// against the fresh cart a bounded number of times.
pub struct CartService<S, C>
where
    S: CartStore,
    C: Catalog,
{
    handler: CommandHandler<S, Cart>,
    catalog: C,
    config: CheckoutConfig,
}

impl<S, C> CartService<S, C>
where
    S: CartStore + Clone,
    C: Catalog,
{
    /// Creates a new cart service.
    pub fn new(store: S, catalog: C, config: CheckoutConfig) -> Self {
        Self {
            handler: CommandHandler::new(store),
            catalog,
            config,
        }
    }

    /// Returns the command handler used for carts.
    pub fn handler(&self) -> &CommandHandler<S, Cart> {
        &self.handler
    }

    /// Returns the catalog.
    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    fn store(&self) -> &S {
        self.handler.repository()
    }

    /// Returns the owner's Active cart, if any.
    pub async fn find_active(&self, owner_id: OwnerId) -> Result<Option<Cart>> {
        Ok(self.store().find_active_cart(owner_id).await?)
    }

    /// Returns the owner's Active cart, creating it if absent.
    #[tracing::instrument(skip(self))]
    pub async fn get_or_create_active(&self, owner_id: OwnerId) -> Result<Cart> {
        if let Some(cart) = self.find_active(owner_id).await? {
            return Ok(cart);
        }

        match self
            .handler
            .create(|cart| cart.open(CartId::new(), owner_id))
            .await
        {
            Ok(result) => {
                tracing::info!(cart_id = ?result.aggregate.id(), "cart opened");
                Ok(result.aggregate)
            }
            Err(CheckoutError::Store(e)) if e.is_unique_violation(ACTIVE_CART_CONSTRAINT) => {
                tracing::debug!("lost race opening cart, re-reading");
                self.find_active(owner_id)
                    .await?
                    .ok_or(CheckoutError::ActiveCartContention)
            }
            Err(e) => Err(e),
        }
    }

    async fn lookup_item(&self, item_id: &ItemId) -> Result<CatalogItem> {
        self.catalog
            .get_item(item_id)
            .await?
            .ok_or_else(|| CheckoutError::ItemNotFound {
                item_id: item_id.to_string(),
            })
    }

    /// Runs `command` against the owner's Active cart, retrying lost races.
    async fn mutate_active<F>(&self, owner_id: OwnerId, create: bool, command: F) -> Result<Cart>
    where
        F: Fn(&Cart) -> std::result::Result<Vec<CartEvent>, CartError> + Send + Sync,
    {
        for _ in 0..self.config.active_cart_attempts {
            let cart = if create {
                self.get_or_create_active(owner_id).await?
            } else {
                self.find_active(owner_id)
                    .await?
                    .ok_or(CheckoutError::NoActiveCart)?
            };

            match self.handler.execute_on(cart, &command).await {
                Ok(result) => return Ok(result.aggregate),
                Err(e) if e.is_concurrency_conflict() => {
                    tracing::debug!("cart changed concurrently, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(CheckoutError::ActiveCartContention)
    }

    /// Adds `quantity` units of an item to the owner's cart.
    #[tracing::instrument(skip(self))]
    pub async fn add_line(
        &self,
        owner_id: OwnerId,
        item_id: &ItemId,
        quantity: u32,
    ) -> Result<Cart> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity { quantity }.into());
        }
        let item = self.lookup_item(item_id).await?;

        self.mutate_active(owner_id, true, |cart| cart.add_line(&item, quantity))
            .await
    }

    /// Sets the quantity of a line in the owner's cart.
    #[tracing::instrument(skip(self))]
    pub async fn update_line_quantity(
        &self,
        owner_id: OwnerId,
        item_id: &ItemId,
        quantity: u32,
    ) -> Result<Cart> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity { quantity }.into());
        }
        let item = self.lookup_item(item_id).await?;

        self.mutate_active(owner_id, true, |cart| {
            cart.update_line_quantity(&item, quantity)
        })
        .await
    }

    /// Removes a line from the owner's cart.
    #[tracing::instrument(skip(self))]
    pub async fn remove_line(&self, owner_id: OwnerId, item_id: &ItemId) -> Result<Cart> {
        self.mutate_active(owner_id, true, |cart| cart.remove_line(item_id))
            .await
    }

    /// Removes every line from the owner's cart.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, owner_id: OwnerId) -> Result<Cart> {
        self.mutate_active(owner_id, true, Cart::clear).await
    }

    /// Abandons the owner's Active cart.
    #[tracing::instrument(skip(self))]
    pub async fn abandon(&self, owner_id: OwnerId) -> Result<Cart> {
        let cart = self.mutate_active(owner_id, false, Cart::abandon).await?;
        tracing::info!(cart_id = ?cart.id(), "cart abandoned");
        Ok(cart)
    }

    /// Returns item counts and total of the owner's Active cart.
    pub async fn summary(&self, owner_id: OwnerId) -> Result<CartSummary> {
        Ok(self
            .find_active(owner_id)
            .await?
            .map(|cart| cart.summary())
            .unwrap_or_default())
    }

    /// Returns every cart of the owner, newest first.
    pub async fn history(&self, owner_id: OwnerId) -> Result<Vec<Cart>> {
        Ok(self.store().list_carts(owner_id).await?)
    }

    /// Fetches current catalog snapshots for every line of a cart.
    pub async fn catalog_snapshot(&self, cart: &Cart) -> Result<HashMap<ItemId, CatalogItem>> {
        let item_ids: Vec<ItemId> = cart.lines().iter().map(|l| l.item_id.clone()).collect();
        Ok(self.catalog.get_items(&item_ids).await?)
    }

    /// Re-checks a cart against the live catalog.
    pub async fn violations_for(&self, cart: &Cart) -> Result<Vec<CheckoutViolation>> {
        let items = self.catalog_snapshot(cart).await?;
        Ok(cart.checkout_violations(&items, self.config.price_drift_epsilon))
    }

    /// Re-checks the owner's Active cart against the live catalog.
    ///
    /// A missing cart is reported the same way as an empty one.
    #[tracing::instrument(skip(self))]
    pub async fn validate(&self, owner_id: OwnerId) -> Result<Vec<CheckoutViolation>> {
        match self.find_active(owner_id).await? {
            Some(cart) => self.violations_for(&cart).await,
            None => Ok(vec![CheckoutViolation::EmptyCart]),
        }
    }
}
