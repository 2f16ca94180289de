//! Domain layer for the bookstore checkout core.
//!
//! This crate provides the core domain abstractions including:
//! - Aggregate trait for version-checked aggregates
//! - DomainEvent trait for domain events
//! - Cart aggregate: the owner's mutable working set
//! - Order aggregate with its payment state machine
//! - Catalog snapshots and checkout violations
//! - The error taxonomy shared by every layer

pub mod aggregate;
pub mod cart;
pub mod catalog;
pub mod error;
pub mod order;
pub mod value_objects;

pub use aggregate::{Aggregate, DomainEvent};
pub use cart::{Cart, CartError, CartEvent, CartStatus, CartSummary};
pub use catalog::{CatalogItem, CheckoutViolation};
pub use error::ErrorKind;
pub use order::{Order, OrderError, OrderEvent, OrderNumber, OrderStatus};
pub use value_objects::{CartLine, ItemId, Money, OrderLine};
