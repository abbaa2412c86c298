//! Charge rule repository.
//!
//! Checkout only reads rules; creation and deletion are exposed for the
//! operator CLI.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;

use marigold_core::{ChargeKind, ChargeRuleId};

use super::{ChargeRuleStore, RepositoryError, map_unique_violation};
use crate::models::{ChargeRule, NewChargeRule};

/// Internal row type for `PostgreSQL` queries.
#[derive(Debug, sqlx::FromRow)]
struct ChargeRuleRow {
    id: i32,
    label: String,
    kind: ChargeKind,
    amount: Decimal,
    is_active: bool,
    min_cart_value: Option<Decimal>,
    max_cart_value: Option<Decimal>,
}

impl From<ChargeRuleRow> for ChargeRule {
    fn from(row: ChargeRuleRow) -> Self {
        Self {
            id: ChargeRuleId::new(row.id),
            label: row.label,
            kind: row.kind,
            amount: row.amount,
            is_active: row.is_active,
            min_cart_value: row.min_cart_value,
            max_cart_value: row.max_cart_value,
        }
    }
}

/// Repository for charge rule database operations.
#[derive(Clone)]
pub struct ChargeRuleRepository {
    pool: PgPool,
}

impl ChargeRuleRepository {
    /// Create a new charge rule repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a charge rule.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` if the rule fails validation,
    /// `RepositoryError::Conflict` if the label is taken, or
    /// `RepositoryError::Database` for other database errors.
    pub async fn create(&self, rule: &NewChargeRule) -> Result<ChargeRule, RepositoryError> {
        rule.validate()
            .map_err(|e| RepositoryError::Validation(e.to_string()))?;

        let row: ChargeRuleRow = sqlx::query_as(
            r"
            INSERT INTO storefront.charge_rule
                (label, kind, amount, is_active, min_cart_value, max_cart_value)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, label, kind, amount, is_active, min_cart_value, max_cart_value
            ",
        )
        .bind(rule.label.trim())
        .bind(rule.kind)
        .bind(rule.amount)
        .bind(rule.is_active)
        .bind(rule.min_cart_value)
        .bind(rule.max_cart_value)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "charge rule"))?;

        Ok(row.into())
    }

    /// Delete a charge rule.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no rule has this ID.
    pub async fn delete(&self, id: ChargeRuleId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.charge_rule WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl ChargeRuleStore for ChargeRuleRepository {
    async fn list(&self, active_only: bool) -> Result<Vec<ChargeRule>, RepositoryError> {
        let rows: Vec<ChargeRuleRow> = sqlx::query_as(
            r"
            SELECT id, label, kind, amount, is_active, min_cart_value, max_cart_value
            FROM storefront.charge_rule
            WHERE is_active OR NOT $1
            ORDER BY id
            ",
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
