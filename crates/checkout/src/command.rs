//! Command handling infrastructure.

use std::marker::PhantomData;

use async_trait::async_trait;
use common::{CartId, OrderId, Version};
use domain::{Aggregate, Cart, Order};
use store::{CartStore, OrderStore};

use crate::error::{CheckoutError, Result};

/// Loads and persists one aggregate type with version checks.
#[async_trait]
pub trait Repository<A: Aggregate>: Send + Sync {
    /// Loads an aggregate with its stored version.
    async fn load(&self, id: A::Id) -> store::Result<Option<A>>;

    /// Persists a new aggregate, returning its first version.
    async fn insert(&self, aggregate: &A) -> store::Result<Version>;

    /// Persists a changed aggregate if the stored version is still `expected`.
    async fn update(&self, aggregate: &A, expected: Version) -> store::Result<Version>;
}

#[async_trait]
impl<S: CartStore> Repository<Cart> for S {
    async fn load(&self, id: CartId) -> store::Result<Option<Cart>> {
        self.get_cart(id).await
    }

    async fn insert(&self, cart: &Cart) -> store::Result<Version> {
        self.insert_cart(cart).await
    }

    async fn update(&self, cart: &Cart, expected: Version) -> store::Result<Version> {
        self.update_cart(cart, expected).await
    }
}

#[async_trait]
impl<S: OrderStore> Repository<Order> for S {
    async fn load(&self, id: OrderId) -> store::Result<Option<Order>> {
        self.get_order(id).await
    }

    async fn insert(&self, order: &Order) -> store::Result<Version> {
        self.insert_order(order).await
    }

    async fn update(&self, order: &Order, expected: Version) -> store::Result<Version> {
        self.update_order(order, expected).await
    }
}

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<A::Event>,

    /// The version of the aggregate after the command.
    pub new_version: Version,
}

impl<A: Aggregate> CommandResult<A> {
    /// Returns true if the command changed nothing.
    pub fn is_noop(&self) -> bool {
        self.events.is_empty()
    }
}

/// Handler for executing commands against aggregates.
///
/// The handler:
/// 1. Loads the aggregate with its stored version
/// 2. Runs the command to produce events
/// 3. Applies the events and writes the new state if the version is unchanged
pub struct CommandHandler<R, A>
where
    R: Repository<A>,
    A: Aggregate,
{
    repository: R,
    _phantom: PhantomData<A>,
}

impl<R, A> CommandHandler<R, A>
where
    R: Repository<A>,
    A: Aggregate,
    CheckoutError: From<A::Error>,
{
    /// Creates a new command handler over the given repository.
    pub fn new(repository: R) -> Self {
        Self {
            repository,
            _phantom: PhantomData,
        }
    }

    /// Returns a reference to the underlying repository.
    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Loads an aggregate, returning None if it doesn't exist.
    pub async fn load(&self, id: A::Id) -> Result<Option<A>> {
        Ok(self.repository.load(id).await?)
    }

    /// Loads an aggregate or fails with `NotFound`.
    pub async fn load_existing(&self, id: A::Id) -> Result<A> {
        self.load(id).await?.ok_or_else(|| CheckoutError::NotFound {
            aggregate_type: A::aggregate_type(),
            id: id.to_string(),
        })
    }

    /// Runs a creation command against a fresh aggregate and inserts it.
    pub async fn create<F>(&self, command_fn: F) -> Result<CommandResult<A>>
    where
        F: FnOnce(&A) -> std::result::Result<Vec<A::Event>, A::Error> + Send,
    {
        let mut aggregate = A::default();
        let events = command_fn(&aggregate)?;

        aggregate.apply_events(events.iter().cloned());
        let new_version = self.repository.insert(&aggregate).await?;
        aggregate.set_version(new_version);

        Ok(CommandResult {
            aggregate,
            events,
            new_version,
        })
    }

    /// Loads an aggregate and runs a command against it.
    pub async fn execute<F>(&self, id: A::Id, command_fn: F) -> Result<CommandResult<A>>
    where
        F: FnOnce(&A) -> std::result::Result<Vec<A::Event>, A::Error> + Send,
    {
        let aggregate = self.load_existing(id).await?;
        self.execute_on(aggregate, command_fn).await
    }

    /// Runs a command against an already loaded aggregate.
    ///
    /// The write only succeeds if the stored version still equals the version
    /// the aggregate was loaded at; otherwise a concurrency conflict is
    /// returned and nothing is written.
    pub async fn execute_on<F>(&self, mut aggregate: A, command_fn: F) -> Result<CommandResult<A>>
    where
        F: FnOnce(&A) -> std::result::Result<Vec<A::Event>, A::Error> + Send,
    {
        let current_version = aggregate.version();
        let events = command_fn(&aggregate)?;

        if events.is_empty() {
            return Ok(CommandResult {
                aggregate,
                events,
                new_version: current_version,
            });
        }

        aggregate.apply_events(events.iter().cloned());
        let new_version = self.repository.update(&aggregate, current_version).await?;
        aggregate.set_version(new_version);

        Ok(CommandResult {
            aggregate,
            events,
            new_version,
        })
    }
}

impl<R, A> Clone for CommandHandler<R, A>
where
    R: Repository<A> + Clone,
    A: Aggregate,
{
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            _phantom: PhantomData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::OwnerId;
    use domain::{CartError, CatalogItem, Money};
    use store::InMemoryStore;

    fn handler() -> CommandHandler<InMemoryStore, Cart> {
        CommandHandler::new(InMemoryStore::new())
    }

    fn book() -> CatalogItem {
        CatalogItem::new("A", "Book A", Money::from_cents(1000), 5)
    }

    #[tokio::test]
    async fn test_create_inserts_first_version() {
        let handler = handler();
        let result = handler
            .create(|cart| cart.open(CartId::new(), OwnerId::new()))
            .await
            .unwrap();

        assert_eq!(result.new_version, Version::first());
        assert_eq!(result.events.len(), 1);

        let id = result.aggregate.id().unwrap();
        let loaded = handler.load_existing(id).await.unwrap();
        assert_eq!(loaded.version(), Version::first());
    }

    #[tokio::test]
    async fn test_execute_bumps_version() {
        let handler = handler();
        let cart = handler
            .create(|cart| cart.open(CartId::new(), OwnerId::new()))
            .await
            .unwrap()
            .aggregate;
        let id = cart.id().unwrap();

        let result = handler
            .execute(id, |cart| cart.add_line(&book(), 2))
            .await
            .unwrap();

        assert_eq!(result.new_version, Version::new(2));
        assert_eq!(result.aggregate.total().cents(), 2000);
    }

    #[tokio::test]
    async fn test_noop_command_writes_nothing() {
        let handler = handler();
        let cart = handler
            .create(|cart| cart.open(CartId::new(), OwnerId::new()))
            .await
            .unwrap()
            .aggregate;

        let result = handler.execute_on(cart, |cart| cart.clear()).await.unwrap();
        assert!(result.is_noop());
        assert_eq!(result.new_version, Version::first());
    }

    #[tokio::test]
    async fn test_stale_aggregate_conflicts() {
        let handler = handler();
        let cart = handler
            .create(|cart| cart.open(CartId::new(), OwnerId::new()))
            .await
            .unwrap()
            .aggregate;

        handler
            .execute_on(cart.clone(), |cart| cart.add_line(&book(), 1))
            .await
            .unwrap();

        let err = handler
            .execute_on(cart, |cart| cart.add_line(&book(), 1))
            .await
            .unwrap_err();
        assert!(err.is_concurrency_conflict());
    }

    #[tokio::test]
    async fn test_command_errors_pass_through() {
        let handler = handler();
        let cart = handler
            .create(|cart| cart.open(CartId::new(), OwnerId::new()))
            .await
            .unwrap()
            .aggregate;

        let err = handler
            .execute_on(cart, |cart| cart.add_line(&book(), 0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Cart(CartError::InvalidQuantity { quantity: 0 })
        ));
    }

    #[tokio::test]
    async fn test_missing_aggregate_is_not_found() {
        let err = handler()
            .execute(CartId::new(), |cart| cart.clear())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::NotFound {
                aggregate_type: "Cart",
                ..
            }
        ));
    }
}
