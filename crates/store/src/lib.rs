//! Persistence for the cart and order aggregates.
//!
//! Aggregates are stored as their current state together with a version.
//! Every write is a compare-and-swap on that version, and the storage layer
//! enforces the uniqueness rules the checkout core relies on:
//! - at most one Active cart per owner
//! - unique order numbers

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::{ACTIVE_CART_CONSTRAINT, CartStore, ORDER_NUMBER_CONSTRAINT, OrderStore};
