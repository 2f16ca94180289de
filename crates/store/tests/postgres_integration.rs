//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container and need a Docker daemon.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --ignored
//! ```

use std::sync::Arc;

use common::{CartId, OrderId, OwnerId, Version};
use domain::{Aggregate, Cart, CatalogItem, Money, Order, OrderNumber, OrderStatus};
use serial_test::serial;
use sqlx::PgPool;
use store::{
    ACTIVE_CART_CONSTRAINT, CartStore, ORDER_NUMBER_CONSTRAINT, OrderStore, PostgresStore,
    StoreError,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            for migration in [
                include_str!("../../../migrations/001_create_checkout_tables.sql"),
                include_str!("../../../migrations/002_index_order_authorizations.sql"),
            ] {
                sqlx::raw_sql(migration).execute(&temp_pool).await.unwrap();
            }
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE carts, orders")
        .execute(&pool)
        .await
        .unwrap();

    PostgresStore::new(pool)
}

fn open_cart(owner_id: OwnerId) -> Cart {
    let mut cart = Cart::default();
    cart.apply_events(cart.open(CartId::new(), owner_id).unwrap());
    cart
}

fn place_order(cart: &Cart, number: &str) -> Order {
    let book = CatalogItem::new("A", "Book A", Money::from_cents(1250), 10);
    let mut cart = cart.clone();
    cart.apply_events(cart.add_line(&book, 2).unwrap());

    let catalog = [(book.item_id.clone(), book)].into_iter().collect();
    let lines = Order::snapshot_lines(cart.lines(), &catalog).unwrap();

    let mut order = Order::default();
    let events = order
        .place(
            OrderId::new(),
            OrderNumber::new(number),
            cart.owner_id().unwrap(),
            cart.id().unwrap(),
            lines,
        )
        .unwrap();
    order.apply_events(events);
    order
}

#[tokio::test]
#[serial]
#[ignore = "requires a Docker daemon"]
async fn insert_and_load_cart() {
    let store = get_test_store().await;
    let owner = OwnerId::new();
    let cart = open_cart(owner);

    assert_eq!(store.insert_cart(&cart).await.unwrap(), Version::first());

    let loaded = store.get_cart(cart.id().unwrap()).await.unwrap().unwrap();
    assert_eq!(loaded.version(), Version::first());
    assert!(loaded.is_owned_by(owner));

    let active = store.find_active_cart(owner).await.unwrap().unwrap();
    assert_eq!(active.id(), cart.id());
}

#[tokio::test]
#[serial]
#[ignore = "requires a Docker daemon"]
async fn partial_unique_index_allows_one_active_cart() {
    let store = get_test_store().await;
    let owner = OwnerId::new();

    let mut first = open_cart(owner);
    let version = store.insert_cart(&first).await.unwrap();

    let err = store.insert_cart(&open_cart(owner)).await.unwrap_err();
    assert!(err.is_unique_violation(ACTIVE_CART_CONSTRAINT), "{err}");

    first.apply_events(first.abandon().unwrap());
    store.update_cart(&first, version).await.unwrap();

    store.insert_cart(&open_cart(owner)).await.unwrap();
    assert_eq!(store.list_carts(owner).await.unwrap().len(), 2);
}

#[tokio::test]
#[serial]
#[ignore = "requires a Docker daemon"]
async fn stale_cart_update_conflicts() {
    let store = get_test_store().await;
    let cart = open_cart(OwnerId::new());
    store.insert_cart(&cart).await.unwrap();

    assert_eq!(
        store.update_cart(&cart, Version::first()).await.unwrap(),
        Version::new(2)
    );

    let err = store.update_cart(&cart, Version::first()).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::ConcurrencyConflict { actual, .. } if actual == Version::new(2)
    ));
}

#[tokio::test]
#[serial]
#[ignore = "requires a Docker daemon"]
async fn update_missing_cart_is_not_found() {
    let store = get_test_store().await;
    let err = store
        .update_cart(&open_cart(OwnerId::new()), Version::first())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[tokio::test]
#[serial]
#[ignore = "requires a Docker daemon"]
async fn order_number_is_unique() {
    let store = get_test_store().await;
    let cart = open_cart(OwnerId::new());

    store
        .insert_order(&place_order(&cart, "ORD-1-abcdef"))
        .await
        .unwrap();

    let err = store
        .insert_order(&place_order(&cart, "ORD-1-abcdef"))
        .await
        .unwrap_err();
    assert!(err.is_unique_violation(ORDER_NUMBER_CONSTRAINT), "{err}");
}

#[tokio::test]
#[serial]
#[ignore = "requires a Docker daemon"]
async fn order_roundtrip_and_lookups() {
    let store = get_test_store().await;
    let cart = open_cart(OwnerId::new());
    let mut order = place_order(&cart, "ORD-2-abcdef");

    let v1 = store.insert_order(&order).await.unwrap();
    order.apply_events(order.attach_authorization("pi_pg").unwrap());
    let v2 = store.update_order(&order, v1).await.unwrap();

    let found = store.find_by_authorization("pi_pg").await.unwrap().unwrap();
    assert_eq!(found.id(), order.id());
    assert_eq!(found.version(), v2);
    assert_eq!(found.total().cents(), 2500);
    assert_eq!(found.lines().len(), 1);

    order.apply_events(order.attach_authorization("pi_pg_2").unwrap());
    store.update_order(&order, v2).await.unwrap();
    for authorization_id in ["pi_pg", "pi_pg_2"] {
        let found = store.find_by_authorization(authorization_id).await.unwrap().unwrap();
        assert_eq!(found.id(), order.id());
    }
    assert!(store.find_by_authorization("pi_pg_3").await.unwrap().is_none());

    let pending = store.find_pending_for_cart(cart.id().unwrap()).await.unwrap();
    assert_eq!(pending.len(), 1);

    let owner = order.owner_id().unwrap();
    assert_eq!(store.list_orders(owner).await.unwrap().len(), 1);
}

#[tokio::test]
#[serial]
#[ignore = "requires a Docker daemon"]
async fn concurrent_mark_paid_has_one_winner() {
    let store = get_test_store().await;
    let cart = open_cart(OwnerId::new());
    let order = place_order(&cart, "ORD-3-abcdef");
    let version = store.insert_order(&order).await.unwrap();

    let mut paid = order.clone();
    paid.apply_events(paid.attach_authorization("pi_race").unwrap());
    paid.apply_events(paid.mark_paid("pi_race").unwrap());
    let mut cancelled = order.clone();
    cancelled.apply_events(cancelled.cancel("race").unwrap());

    let (a, b) = tokio::join!(
        store.update_order(&paid, version),
        store.update_order(&cancelled, version)
    );
    assert_eq!(
        [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(),
        1
    );

    let stored = store.get_order(order.id().unwrap()).await.unwrap().unwrap();
    assert!(matches!(
        stored.status(),
        OrderStatus::Paid | OrderStatus::Cancelled
    ));
    assert_eq!(stored.version(), Version::new(2));
}

#[tokio::test]
#[serial]
#[ignore = "requires a Docker daemon"]
async fn pending_before_cutoff() {
    let store = get_test_store().await;
    let cart = open_cart(OwnerId::new());
    store
        .insert_order(&place_order(&cart, "ORD-4-abcdef"))
        .await
        .unwrap();

    let past = chrono::Utc::now() - chrono::Duration::hours(1);
    assert!(store.list_pending_before(past).await.unwrap().is_empty());

    let future = chrono::Utc::now() + chrono::Duration::minutes(1);
    assert_eq!(store.list_pending_before(future).await.unwrap().len(), 1);
}

#[tokio::test]
#[serial]
#[ignore = "requires a Docker daemon"]
async fn ping_reaches_database() {
    let store = get_test_store().await;
    assert!(store.ping().await);

    store.pool().close().await;
    assert!(!store.ping().await);
}
