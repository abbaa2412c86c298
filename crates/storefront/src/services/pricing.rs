//! Server-side pricing.
//!
//! Totals are always recomputed here from the cart's line items. Any total or
//! charge breakdown a client sends is ignored.

use std::sync::Arc;
use std::time::Duration;

use marigold_core::MAX_AMOUNT;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{instrument, warn};

use crate::db::{ChargeRuleStore, RepositoryError};
use crate::models::{AppliedCharge, ChargeRule};

#[derive(Debug, Error)]
pub enum PricingError {
    /// The charge-rule store could not be read.
    #[error("charge rules unavailable: {0}")]
    Unavailable(#[source] RepositoryError),

    /// The priced total does not fit a stored amount.
    #[error("order total exceeds {MAX_AMOUNT}")]
    AmountTooLarge,
}

/// The authoritative price of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceQuote {
    pub subtotal: Decimal,
    pub charges: Vec<AppliedCharge>,
    pub additional_amount: Decimal,
    pub total: Decimal,
    /// Charges could not be loaded and were priced at zero.
    pub degraded: bool,
}

/// Applies administrator-authored charge rules to a subtotal.
pub struct PricingEngine {
    rules: Arc<dyn ChargeRuleStore>,
    fail_open: bool,
    timeout: Duration,
}

impl PricingEngine {
    /// `fail_open` prices carts with no additional charges when the rule
    /// store is unavailable instead of refusing them.
    #[must_use]
    pub fn new(rules: Arc<dyn ChargeRuleStore>, fail_open: bool, timeout: Duration) -> Self {
        Self {
            rules,
            fail_open,
            timeout,
        }
    }

    /// Rules that apply to `subtotal`, in store order.
    ///
    /// # Errors
    ///
    /// Returns `PricingError::Unavailable` if the rules cannot be loaded.
    pub async fn applicable_charges(&self, subtotal: Decimal) -> Result<Vec<ChargeRule>, PricingError> {
        let rules = match tokio::time::timeout(self.timeout, self.rules.list(true)).await {
            Ok(result) => result.map_err(PricingError::Unavailable)?,
            Err(_) => return Err(PricingError::Unavailable(RepositoryError::Timeout(self.timeout))),
        };

        Ok(rules.into_iter().filter(|r| r.applies_to(subtotal)).collect())
    }

    /// Sum of the contributions of `charges` to a cart with `subtotal`, or
    /// `None` on overflow.
    #[must_use]
    pub fn compute_total(subtotal: Decimal, charges: &[ChargeRule]) -> Option<Decimal> {
        charges.iter().try_fold(Decimal::ZERO, |sum, rule| {
            sum.checked_add(rule.contribution(subtotal)?)
        })
    }

    fn priced(subtotal: Decimal, rules: &[ChargeRule]) -> Result<PriceQuote, PricingError> {
        let charges = rules
            .iter()
            .map(|r| r.applied(subtotal))
            .collect::<Option<Vec<_>>>()
            .ok_or(PricingError::AmountTooLarge)?;
        let additional_amount =
            Self::compute_total(subtotal, rules).ok_or(PricingError::AmountTooLarge)?;
        let total = subtotal
            .checked_add(additional_amount)
            .filter(|total| *total <= MAX_AMOUNT)
            .ok_or(PricingError::AmountTooLarge)?;

        Ok(PriceQuote {
            subtotal,
            charges,
            additional_amount,
            total,
            degraded: false,
        })
    }

    /// Price a cart subtotal.
    ///
    /// # Errors
    ///
    /// Returns `PricingError::Unavailable` if the rules cannot be loaded and
    /// the engine does not fail open, `PricingError::AmountTooLarge` if the
    /// charged total does not fit a stored amount.
    #[instrument(skip(self), fields(subtotal = %subtotal))]
    pub async fn quote(&self, subtotal: Decimal) -> Result<PriceQuote, PricingError> {
        match self.applicable_charges(subtotal).await {
            Ok(rules) => Self::priced(subtotal, &rules),
            Err(e) if self.fail_open => {
                warn!(error = %e, "Pricing without additional charges");
                Ok(PriceQuote {
                    subtotal,
                    charges: Vec::new(),
                    additional_amount: Decimal::ZERO,
                    total: subtotal,
                    degraded: true,
                })
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;
    use marigold_core::{ChargeKind, ChargeRuleId};

    use super::*;

    struct Rules(Vec<ChargeRule>);

    #[async_trait]
    impl ChargeRuleStore for Rules {
        async fn list(&self, active_only: bool) -> Result<Vec<ChargeRule>, RepositoryError> {
            Ok(self
                .0
                .iter()
                .filter(|r| !active_only || r.is_active)
                .cloned()
                .collect())
        }
    }

    struct Down;

    #[async_trait]
    impl ChargeRuleStore for Down {
        async fn list(&self, _active_only: bool) -> Result<Vec<ChargeRule>, RepositoryError> {
            Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
        }
    }

    fn rule(
        id: i32,
        kind: ChargeKind,
        amount: i64,
        active: bool,
        range: (Option<i64>, Option<i64>),
    ) -> ChargeRule {
        ChargeRule {
            id: ChargeRuleId::new(id),
            label: format!("Rule {id}"),
            kind,
            amount: Decimal::from(amount),
            is_active: active,
            min_cart_value: range.0.map(Decimal::from),
            max_cart_value: range.1.map(Decimal::from),
        }
    }

    fn engine(rules: Vec<ChargeRule>) -> PricingEngine {
        PricingEngine::new(Arc::new(Rules(rules)), true, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_flat_charge_under_threshold() {
        let engine = engine(vec![rule(1, ChargeKind::Fixed, 100, true, (Some(0), Some(2000)))]);

        let quote = engine.quote(Decimal::from(1800)).await.unwrap();
        assert_eq!(quote.charges.len(), 1);
        assert_eq!(quote.charges[0].amount, Decimal::from(100));
        assert_eq!(quote.additional_amount, Decimal::from(100));
        assert_eq!(quote.total, Decimal::from(1900));
        assert!(!quote.degraded);

        let quote = engine.quote(Decimal::from(2000)).await.unwrap();
        assert!(quote.charges.is_empty());
        assert_eq!(quote.total, Decimal::from(2000));
    }

    #[tokio::test]
    async fn test_charges_are_additive() {
        let engine = engine(vec![
            rule(1, ChargeKind::Fixed, 50, true, (None, None)),
            rule(2, ChargeKind::Percentage, 5, true, (Some(1000), None)),
            rule(3, ChargeKind::Fixed, 999, false, (None, None)),
        ]);

        let quote = engine.quote(Decimal::from(1800)).await.unwrap();
        let ids: Vec<i32> = quote.charges.iter().map(|c| c.rule_id.as_i32()).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(quote.additional_amount, Decimal::from(140));
        assert_eq!(quote.total, Decimal::from(1940));
    }

    #[tokio::test]
    async fn test_only_active_rules_in_range() {
        let rules = vec![
            rule(1, ChargeKind::Fixed, 10, true, (Some(0), Some(500))),
            rule(2, ChargeKind::Fixed, 20, true, (Some(500), Some(1000))),
            rule(3, ChargeKind::Fixed, 30, false, (Some(0), None)),
            rule(4, ChargeKind::Fixed, 40, true, (Some(1000), None)),
        ];
        let engine = engine(rules);

        for subtotal in [0, 1, 499, 500, 999, 1000, 5000] {
            let subtotal = Decimal::from(subtotal);
            for applied in engine.applicable_charges(subtotal).await.unwrap() {
                assert!(applied.is_active);
                assert!(subtotal >= applied.min_cart_value.unwrap_or_default());
                assert!(applied.max_cart_value.is_none_or(|max| subtotal < max));
            }
        }
        assert_eq!(engine.applicable_charges(Decimal::from(500)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_percentage_rounds_to_cents() {
        let engine = engine(vec![rule(1, ChargeKind::Percentage, 3, true, (None, None))]);
        let quote = engine.quote(Decimal::new(33333, 2)).await.unwrap();
        assert_eq!(quote.additional_amount, Decimal::new(1000, 2));
    }

    #[tokio::test]
    async fn test_fail_open_prices_at_zero() {
        let engine = PricingEngine::new(Arc::new(Down), true, Duration::from_secs(1));
        let quote = engine.quote(Decimal::from(1800)).await.unwrap();
        assert!(quote.degraded);
        assert_eq!(quote.total, Decimal::from(1800));
    }

    #[tokio::test]
    async fn test_total_beyond_storable_amount() {
        let mut huge = rule(1, ChargeKind::Fixed, 0, true, (None, None));
        huge.amount = MAX_AMOUNT;
        let engine = engine(vec![huge]);

        assert!(matches!(
            engine.quote(Decimal::ONE).await,
            Err(PricingError::AmountTooLarge)
        ));
        assert_eq!(engine.quote(Decimal::ZERO).await.unwrap().total, MAX_AMOUNT);
    }

    #[test]
    fn test_compute_total_overflow() {
        let rules = vec![rule(1, ChargeKind::Percentage, 50, true, (None, None))];
        assert_eq!(PricingEngine::compute_total(Decimal::MAX, &rules), None);
    }

    #[tokio::test]
    async fn test_fail_closed_refuses() {
        let engine = PricingEngine::new(Arc::new(Down), false, Duration::from_secs(1));
        assert!(matches!(
            engine.quote(Decimal::from(1800)).await,
            Err(PricingError::Unavailable(_))
        ));
    }
}
