//! Order and stock repositories against a real `PostgreSQL` schema.
//!
//! These tests require a running `PostgreSQL` database reachable through
//! `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`). The storefront migrations
//! are applied on connect. Each test works on its own random product id so
//! runs can share a database.
//!
//! Run with:
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/marigold_test \
//!     cargo test -p marigold-integration-tests --test postgres -- --ignored
//! ```

use std::sync::Arc;

use marigold_core::{OrderStatus, ProductId};
use marigold_integration_tests::order_for;
use marigold_storefront::db::{OrderRepository, OrderStore, ProductRepository, create_pool};
use marigold_storefront::models::StatusUpdate;
use marigold_storefront::services::InventoryOracle;
use rand::Rng;
use secrecy::SecretString;
use sqlx::PgPool;

async fn pool() -> PgPool {
    let url = std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .expect("STOREFRONT_DATABASE_URL or DATABASE_URL must be set");
    let pool = create_pool(&SecretString::from(url))
        .await
        .expect("Failed to connect to database");
    sqlx::migrate!("../storefront/migrations")
        .run(&pool)
        .await
        .expect("Failed to run storefront migrations");
    pool
}

async fn fresh_product(pool: &PgPool, total: i64) -> ProductId {
    let id: i32 = rand::rng().random_range(1_000_000..i32::MAX);
    let product = ProductId::new(id);
    ProductRepository::new(pool.clone())
        .upsert(product, "Test Tee", total)
        .await
        .expect("Failed to create product");
    product
}

// =============================================================================
// Reserved stock
// =============================================================================

#[tokio::test]
#[ignore = "Requires a PostgreSQL database"]
async fn test_sum_reserved_excludes_cancelled_orders() {
    let pool = pool().await;
    let product = fresh_product(&pool, 10).await;
    let orders = OrderRepository::new(pool.clone());
    let id = product.as_i32();

    orders.create(&order_for(id, 3)).await.unwrap();
    orders.create(&order_for(id, 4)).await.unwrap();
    let cancelled = orders.create(&order_for(id, 5)).await.unwrap();
    orders
        .update_status(cancelled.id, StatusUpdate::Cancelled { reason: None })
        .await
        .unwrap();

    assert_eq!(
        orders
            .sum_reserved(product, &OrderStatus::RESERVING)
            .await
            .unwrap(),
        7
    );

    let oracle = InventoryOracle::new(
        Arc::new(ProductRepository::new(pool.clone())),
        Arc::new(orders),
    );
    let snapshot = oracle.available_stock(product).await.unwrap();
    assert_eq!(snapshot.total, 10);
    assert_eq!(snapshot.reserved, 7);
    assert_eq!(snapshot.available, 3);
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database"]
async fn test_shipped_order_stops_reserving() {
    let pool = pool().await;
    let product = fresh_product(&pool, 5).await;
    let orders = OrderRepository::new(pool.clone());

    let order = orders.create(&order_for(product.as_i32(), 2)).await.unwrap();
    assert_eq!(
        orders
            .sum_reserved(product, &OrderStatus::RESERVING)
            .await
            .unwrap(),
        2
    );

    let shipped = orders
        .update_status(
            order.id,
            StatusUpdate::Shipped {
                tracking_number: "AWB123".to_string(),
                carrier: "fake".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(shipped.status, OrderStatus::Shipped);
    assert!(shipped.timestamps.shipped_at.is_some());

    let stored = orders.get(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Shipped);
    assert_eq!(stored.tracking_number.as_deref(), Some("AWB123"));
    assert_eq!(
        orders
            .sum_reserved(product, &OrderStatus::RESERVING)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database"]
async fn test_sum_reserved_for_unordered_product_is_zero() {
    let pool = pool().await;
    let product = fresh_product(&pool, 4).await;
    let orders = OrderRepository::new(pool);

    assert_eq!(
        orders
            .sum_reserved(product, &OrderStatus::RESERVING)
            .await
            .unwrap(),
        0
    );
}

// =============================================================================
// Status transitions
// =============================================================================

#[tokio::test]
#[ignore = "Requires a PostgreSQL database"]
async fn test_backwards_transition_is_refused_and_not_written() {
    let pool = pool().await;
    let product = fresh_product(&pool, 3).await;
    let orders = OrderRepository::new(pool);

    let order = orders.create(&order_for(product.as_i32(), 1)).await.unwrap();
    orders
        .update_status(order.id, StatusUpdate::Cancelled { reason: None })
        .await
        .unwrap();

    assert!(
        orders
            .update_status(order.id, StatusUpdate::Processing)
            .await
            .is_err()
    );
    let stored = orders.get(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Cancelled);
}
