//! Human-facing order numbers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order number of the form `ORD-<unix millis>-<6 hex>`.
///
/// Uniqueness is enforced by storage; callers regenerate on a collision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Generates a fresh order number for the current time.
    pub fn generate() -> Self {
        Self::generate_at(Utc::now())
    }

    /// Generates an order number for the given time.
    pub fn generate_at(at: DateTime<Utc>) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("ORD-{}-{}", at.timestamp_millis(), &suffix[..6]))
    }

    /// Wraps an existing order number.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the order number as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for OrderNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
