use common::Version;
use domain::ErrorKind;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The stored version did not match the version the writer loaded.
    #[error(
        "Concurrency conflict for {aggregate_type} {aggregate_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        aggregate_type: &'static str,
        aggregate_id: Uuid,
        expected: Version,
        actual: Version,
    },

    /// A uniqueness constraint rejected the write.
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// The aggregate to update does not exist.
    #[error("{aggregate_type} not found: {aggregate_id}")]
    NotFound {
        aggregate_type: &'static str,
        aggregate_id: Uuid,
    },

    /// The aggregate has no identifier yet and cannot be persisted.
    #[error("Cannot persist an uninitialized {aggregate_type}")]
    Uninitialized { aggregate_type: &'static str },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true if the error is a lost compare-and-swap.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, StoreError::ConcurrencyConflict { .. })
    }

    /// Returns true if the named uniqueness constraint rejected the write.
    pub fn is_unique_violation(&self, name: &str) -> bool {
        matches!(self, StoreError::UniqueViolation { constraint } if constraint == name)
    }

    /// Returns the error category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::ConcurrencyConflict { .. } | StoreError::UniqueViolation { .. } => {
                ErrorKind::Conflict
            }
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::Database(sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)) => {
                ErrorKind::Unavailable
            }
            StoreError::Uninitialized { .. }
            | StoreError::Database(_)
            | StoreError::Migration(_)
            | StoreError::Serialization(_) => ErrorKind::Internal,
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_kinds() {
        let err = StoreError::ConcurrencyConflict {
            aggregate_type: "Order",
            aggregate_id: Uuid::new_v4(),
            expected: Version::first(),
            actual: Version::new(2),
        };
        assert!(err.is_concurrency_conflict());
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err = StoreError::UniqueViolation {
            constraint: "orders_order_number_key".to_string(),
        };
        assert!(err.is_unique_violation("orders_order_number_key"));
        assert!(!err.is_unique_violation("carts_one_active_per_owner"));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_pool_timeout_is_unavailable() {
        let err = StoreError::Database(sqlx::Error::PoolTimedOut);
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert_eq!(
            StoreError::Database(sqlx::Error::RowNotFound).kind(),
            ErrorKind::Internal
        );
    }
}
