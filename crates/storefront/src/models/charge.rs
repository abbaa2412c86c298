//! Charge rules.
//!
//! Rules are authored by administrators and read-only to checkout. A rule
//! applies to a subtotal when it is active and the subtotal falls in
//! `[min_cart_value, max_cart_value)`; a missing bound is open.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use marigold_core::{ChargeKind, ChargeRuleId, percent_of, round_money};

/// An additional charge (shipping, handling, fees) configured by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeRule {
    pub id: ChargeRuleId,
    /// Label shown to the buyer, e.g. "Shipping".
    pub label: String,
    pub kind: ChargeKind,
    /// Flat amount for `Fixed` rules, rate in percent for `Percentage` rules.
    pub amount: Decimal,
    pub is_active: bool,
    /// Inclusive lower bound on the subtotal.
    pub min_cart_value: Option<Decimal>,
    /// Exclusive upper bound on the subtotal.
    pub max_cart_value: Option<Decimal>,
}

impl ChargeRule {
    /// Whether this rule contributes to a cart with the given subtotal.
    #[must_use]
    pub fn applies_to(&self, subtotal: Decimal) -> bool {
        self.is_active
            && subtotal >= self.min_cart_value.unwrap_or(Decimal::ZERO)
            && self.max_cart_value.is_none_or(|max| subtotal < max)
    }

    /// The amount this rule adds to a cart with the given subtotal, or `None`
    /// on overflow.
    #[must_use]
    pub fn contribution(&self, subtotal: Decimal) -> Option<Decimal> {
        match self.kind {
            ChargeKind::Fixed => Some(round_money(self.amount)),
            ChargeKind::Percentage => percent_of(subtotal, self.amount),
        }
    }

    /// Snapshot of this rule's effect, for embedding in an order.
    #[must_use]
    pub fn applied(&self, subtotal: Decimal) -> Option<AppliedCharge> {
        Some(AppliedCharge {
            rule_id: self.id,
            label: self.label.clone(),
            kind: self.kind,
            amount: self.contribution(subtotal)?,
        })
    }
}

/// A charge as it was applied to one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedCharge {
    pub rule_id: ChargeRuleId,
    pub label: String,
    pub kind: ChargeKind,
    pub amount: Decimal,
}

/// Errors in a charge rule definition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChargeRuleError {
    #[error("label cannot be empty")]
    EmptyLabel,
    #[error("amount cannot be negative")]
    NegativeAmount,
    #[error("percentage rate cannot exceed 100")]
    RateTooHigh,
    #[error("min_cart_value ({min}) must not exceed max_cart_value ({max})")]
    InvertedRange { min: Decimal, max: Decimal },
}

/// Parameters for creating a charge rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewChargeRule {
    pub label: String,
    pub kind: ChargeKind,
    pub amount: Decimal,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub min_cart_value: Option<Decimal>,
    #[serde(default)]
    pub max_cart_value: Option<Decimal>,
}

const fn default_active() -> bool {
    true
}

impl NewChargeRule {
    /// Check the rule's invariants before it is stored.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ChargeRuleError> {
        if self.label.trim().is_empty() {
            return Err(ChargeRuleError::EmptyLabel);
        }
        if self.amount.is_sign_negative() {
            return Err(ChargeRuleError::NegativeAmount);
        }
        if self.kind == ChargeKind::Percentage && self.amount > Decimal::ONE_HUNDRED {
            return Err(ChargeRuleError::RateTooHigh);
        }
        if let (Some(min), Some(max)) = (self.min_cart_value, self.max_cart_value)
            && min > max
        {
            return Err(ChargeRuleError::InvertedRange { min, max });
        }
        Ok(())
    }
}
