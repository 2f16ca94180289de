//! Shared identifier and versioning types for the checkout workspace.

pub mod types;

pub use types::{CartId, OrderId, OwnerId, Version};
