//! Product stock repository.
//!
//! Only the stock total lives here. Reservations are never written back;
//! availability is derived from order states at read time.

use async_trait::async_trait;
use sqlx::PgPool;

use marigold_core::ProductId;

use super::{RepositoryError, StockStore};

/// Repository for product stock database operations.
#[derive(Clone)]
pub struct ProductRepository {
    pool: PgPool,
}

impl ProductRepository {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a product or overwrite its name and stock total.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` for a blank name or negative
    /// total, or `RepositoryError::Database` if the write fails.
    pub async fn upsert(
        &self,
        product: ProductId,
        name: &str,
        total: i64,
    ) -> Result<(), RepositoryError> {
        if name.trim().is_empty() {
            return Err(RepositoryError::Validation(
                "product name cannot be empty".to_owned(),
            ));
        }
        if total < 0 {
            return Err(RepositoryError::Validation(
                "stock total cannot be negative".to_owned(),
            ));
        }

        sqlx::query(
            r"
            INSERT INTO storefront.product (id, name, total_stock)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, total_stock = EXCLUDED.total_stock, updated_at = NOW()
            ",
        )
        .bind(product)
        .bind(name.trim())
        .bind(total)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl StockStore for ProductRepository {
    async fn total_stock(&self, product: ProductId) -> Result<Option<i64>, RepositoryError> {
        let total: Option<i64> =
            sqlx::query_scalar("SELECT total_stock FROM storefront.product WHERE id = $1")
                .bind(product)
                .fetch_optional(&self.pool)
                .await?;

        Ok(total)
    }

    async fn set_total_stock(
        &self,
        product: ProductId,
        total: i64,
    ) -> Result<(), RepositoryError> {
        if total < 0 {
            return Err(RepositoryError::Validation(
                "stock total cannot be negative".to_owned(),
            ));
        }

        let result = sqlx::query(
            r"
            UPDATE storefront.product
            SET total_stock = $2, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(product)
        .bind(total)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
