//! Database operations for storefront `PostgreSQL`.
//!
//! # Database: `marigold_storefront`
//!
//! ## Tables
//!
//! - `storefront.product` - Catalog stock totals (written by administrators)
//! - `storefront.charge_rule` - Additional charges applied at checkout
//! - `storefront.order` - Placed orders, one row per order with embedded
//!   line items, charges and fulfillment identifiers
//!
//! # Seams
//!
//! The pipeline talks to storage through the [`OrderStore`],
//! [`ChargeRuleStore`] and [`StockStore`] traits so the same orchestration
//! code runs against `PostgreSQL` in production and in-memory stores in tests.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p marigold-cli -- migrate
//! ```

pub mod charges;
pub mod orders;
pub mod products;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use marigold_core::{OrderId, OrderStatus, ProductId};

use crate::models::{ChargeRule, Order, StatusUpdate, TransitionError};

pub use charges::ChargeRuleRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Input rejected before it reached the database.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Constraint violation (e.g., duplicate order ID).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The requested status change is not allowed.
    #[error("invalid transition: {0}")]
    InvalidTransition(#[from] TransitionError),

    /// The store did not answer in time.
    #[error("storage timed out after {0:?}")]
    Timeout(Duration),
}

/// Durable storage for orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Write a new order as a single row.
    ///
    /// Returns `RepositoryError::Conflict` if an order with the same ID exists.
    async fn create(&self, order: &Order) -> Result<Order, RepositoryError>;

    /// Load an order by ID.
    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Apply a status transition and return the updated order.
    async fn update_status(
        &self,
        id: OrderId,
        update: StatusUpdate,
    ) -> Result<Order, RepositoryError>;

    /// Total units of `product` across orders in any of `statuses`.
    async fn sum_reserved(
        &self,
        product: ProductId,
        statuses: &[OrderStatus],
    ) -> Result<i64, RepositoryError>;
}

/// Read access to administrator-authored charge rules.
#[async_trait]
pub trait ChargeRuleStore: Send + Sync {
    /// List rules in display order, optionally only the active ones.
    async fn list(&self, active_only: bool) -> Result<Vec<ChargeRule>, RepositoryError>;
}

/// Product stock totals.
#[async_trait]
pub trait StockStore: Send + Sync {
    /// Total stock on hand, or `None` for an unknown product.
    async fn total_stock(&self, product: ProductId) -> Result<Option<i64>, RepositoryError>;

    /// Overwrite the stock total (administrative edit).
    async fn set_total_stock(&self, product: ProductId, total: i64)
    -> Result<(), RepositoryError>;
}

/// Map a unique-violation into `RepositoryError::Conflict`.
pub(crate) fn map_unique_violation(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
