use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CartId, OrderId, OwnerId, Version};
use domain::{Aggregate, Cart, Order};
use serde::de::DeserializeOwned;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{CartStore, OrderStore},
};

/// PostgreSQL-backed store implementation.
///
/// Each aggregate is stored as JSONB next to the columns used for lookups
/// and constraints. Updates are conditional on the version column.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the database at `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("checkout migrations applied");
        Ok(())
    }

    /// Returns true if the database answers a trivial query.
    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

fn require_id<A: Aggregate>(aggregate: &A) -> Result<Uuid>
where
    A::Id: Into<Uuid>,
{
    aggregate
        .id()
        .map(Into::into)
        .ok_or(StoreError::Uninitialized {
            aggregate_type: A::aggregate_type(),
        })
}

fn row_to_aggregate<A: Aggregate + DeserializeOwned>(row: PgRow) -> Result<A> {
    let state: serde_json::Value = row.try_get("state")?;
    let mut aggregate: A = serde_json::from_value(state)?;
    aggregate.set_version(Version::new(row.try_get("version")?));
    Ok(aggregate)
}

fn rows_to_aggregates<A: Aggregate + DeserializeOwned>(rows: Vec<PgRow>) -> Result<Vec<A>> {
    rows.into_iter().map(row_to_aggregate).collect()
}

/// Maps unique violations to [`StoreError::UniqueViolation`].
fn map_write_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        let constraint = db_err.constraint().unwrap_or("unknown").to_string();
        tracing::debug!(%constraint, "unique constraint rejected write");
        return StoreError::UniqueViolation { constraint };
    }
    StoreError::Database(e)
}

impl PostgresStore {
    /// Resolves a conditional update that touched no rows.
    async fn missed_update<A: Aggregate>(
        &self,
        table: &'static str,
        id: Uuid,
        expected: Version,
    ) -> StoreError {
        let sql = format!("SELECT version FROM {table} WHERE id = $1");
        match sqlx::query_scalar::<_, i64>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
        {
            Ok(Some(actual)) => {
                tracing::debug!(table, %id, %expected, actual, "version check failed");
                metrics::counter!("store_version_conflicts_total", "aggregate" => A::aggregate_type())
                    .increment(1);
                StoreError::ConcurrencyConflict {
                    aggregate_type: A::aggregate_type(),
                    aggregate_id: id,
                    expected,
                    actual: Version::new(actual),
                }
            }
            Ok(None) => StoreError::NotFound {
                aggregate_type: A::aggregate_type(),
                aggregate_id: id,
            },
            Err(e) => StoreError::Database(e),
        }
    }
}

const CART_COLUMNS: &str = "id, version, state";
const ORDER_COLUMNS: &str = "id, version, state";

#[async_trait]
impl CartStore for PostgresStore {
    async fn insert_cart(&self, cart: &Cart) -> Result<Version> {
        let id = require_id(cart)?;
        let owner_id = cart.owner_id().map(Uuid::from);
        let state = serde_json::to_value(cart)?;

        let result = sqlx::query(
            r#"
            INSERT INTO carts (id, owner_id, status, version, state, opened_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(cart.status().as_str())
        .bind(Version::first().as_i64())
        .bind(state)
        .bind(cart.opened_at().unwrap_or_else(Utc::now))
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Err(self
                .missed_update::<Cart>("carts", id, Version::initial())
                .await);
        }

        Ok(Version::first())
    }

    async fn update_cart(&self, cart: &Cart, expected: Version) -> Result<Version> {
        let id = require_id(cart)?;
        let new_version = expected.next();
        let state = serde_json::to_value(cart)?;

        let result = sqlx::query(
            r#"
            UPDATE carts
            SET status = $2, version = $3, state = $4, updated_at = NOW()
            WHERE id = $1 AND version = $5
            "#,
        )
        .bind(id)
        .bind(cart.status().as_str())
        .bind(new_version.as_i64())
        .bind(state)
        .bind(expected.as_i64())
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Err(self.missed_update::<Cart>("carts", id, expected).await);
        }

        Ok(new_version)
    }

    async fn get_cart(&self, cart_id: CartId) -> Result<Option<Cart>> {
        let sql = format!("SELECT {CART_COLUMNS} FROM carts WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(cart_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_aggregate).transpose()
    }

    async fn find_active_cart(&self, owner_id: OwnerId) -> Result<Option<Cart>> {
        let sql =
            format!("SELECT {CART_COLUMNS} FROM carts WHERE owner_id = $1 AND status = 'Active'");
        let row = sqlx::query(&sql)
            .bind(owner_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_aggregate).transpose()
    }

    async fn list_carts(&self, owner_id: OwnerId) -> Result<Vec<Cart>> {
        let sql = format!(
            "SELECT {CART_COLUMNS} FROM carts WHERE owner_id = $1 ORDER BY opened_at DESC, id"
        );
        let rows = sqlx::query(&sql)
            .bind(owner_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;

        rows_to_aggregates(rows)
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn insert_order(&self, order: &Order) -> Result<Version> {
        let id = require_id(order)?;
        let state = serde_json::to_value(order)?;

        let result = sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, owner_id, cart_id, status, authorization_id,
                total_cents, version, state, placed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(order.order_number().map(|n| n.as_str().to_string()))
        .bind(order.owner_id().map(Uuid::from))
        .bind(order.cart_id().map(Uuid::from))
        .bind(order.status().as_str())
        .bind(order.authorization_id())
        .bind(order.total().cents())
        .bind(Version::first().as_i64())
        .bind(state)
        .bind(order.placed_at().unwrap_or_else(Utc::now))
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Err(self
                .missed_update::<Order>("orders", id, Version::initial())
                .await);
        }

        Ok(Version::first())
    }

    async fn update_order(&self, order: &Order, expected: Version) -> Result<Version> {
        let id = require_id(order)?;
        let new_version = expected.next();
        let state = serde_json::to_value(order)?;

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, authorization_id = $3, version = $4, state = $5, updated_at = NOW()
            WHERE id = $1 AND version = $6
            "#,
        )
        .bind(id)
        .bind(order.status().as_str())
        .bind(order.authorization_id())
        .bind(new_version.as_i64())
        .bind(state)
        .bind(expected.as_i64())
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Err(self.missed_update::<Order>("orders", id, expected).await);
        }

        Ok(new_version)
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_aggregate).transpose()
    }

    async fn find_by_authorization(&self, authorization_id: &str) -> Result<Option<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE state -> 'authorization_ids' @> jsonb_build_array($1::text) \
             ORDER BY placed_at DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(authorization_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_aggregate).transpose()
    }

    async fn find_pending_for_cart(&self, cart_id: CartId) -> Result<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE cart_id = $1 AND status = 'Pending' ORDER BY placed_at DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(cart_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;

        rows_to_aggregates(rows)
    }

    async fn list_orders(&self, owner_id: OwnerId) -> Result<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE owner_id = $1 ORDER BY placed_at DESC, id"
        );
        let rows = sqlx::query(&sql)
            .bind(owner_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;

        rows_to_aggregates(rows)
    }

    async fn list_pending_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE status = 'Pending' AND placed_at < $1 ORDER BY placed_at ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;

        rows_to_aggregates(rows)
    }
}
