//! Live stock availability.
//!
//! Availability is derived at read time: total stock minus the units held by
//! orders that still reserve stock (pending, confirmed, processing). Nothing
//! is decremented when an order is placed, so two buyers racing for the last
//! unit can both pass an availability check.

use std::sync::Arc;

use marigold_core::{OrderStatus, ProductId};
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use crate::db::{OrderStore, RepositoryError, StockStore};

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("product {0} not found")]
    NotFound(ProductId),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Computed stock view for one product. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockSnapshot {
    pub product_id: ProductId,
    pub total: i64,
    pub reserved: i64,
    pub available: i64,
    pub in_stock: bool,
}

impl StockSnapshot {
    #[must_use]
    pub fn new(product_id: ProductId, total: i64, reserved: i64) -> Self {
        let available = total.saturating_sub(reserved).max(0);
        Self {
            product_id,
            total,
            reserved,
            available,
            in_stock: available > 0,
        }
    }
}

/// Answer to "can I buy `quantity` of this?".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub available: bool,
    /// Most units that could be bought right now.
    pub max: i64,
}

pub struct InventoryOracle {
    stock: Arc<dyn StockStore>,
    orders: Arc<dyn OrderStore>,
}

impl InventoryOracle {
    #[must_use]
    pub fn new(stock: Arc<dyn StockStore>, orders: Arc<dyn OrderStore>) -> Self {
        Self { stock, orders }
    }

    /// Current stock view for `product`.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::NotFound` for an unknown product, or the
    /// underlying storage error.
    #[instrument(skip(self))]
    pub async fn available_stock(&self, product: ProductId) -> Result<StockSnapshot, InventoryError> {
        let total = self
            .stock
            .total_stock(product)
            .await?
            .ok_or(InventoryError::NotFound(product))?;
        let reserved = self
            .orders
            .sum_reserved(product, &OrderStatus::RESERVING)
            .await?;

        Ok(StockSnapshot::new(product, total, reserved))
    }

    /// Whether `quantity` units of `product` can be bought.
    ///
    /// # Errors
    ///
    /// Same as [`available_stock`](Self::available_stock).
    pub async fn check_availability(
        &self,
        product: ProductId,
        quantity: u32,
    ) -> Result<Availability, InventoryError> {
        let snapshot = self.available_stock(product).await?;
        Ok(Availability {
            available: quantity > 0 && i64::from(quantity) <= snapshot.available,
            max: snapshot.available,
        })
    }
}
