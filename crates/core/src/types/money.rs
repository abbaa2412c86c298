//! Decimal money helpers.
//!
//! Amounts are plain `Decimal`s in the store currency's standard unit. All
//! derived amounts are rounded to two places, half away from zero.

use rust_decimal::{Decimal, RoundingStrategy};

/// Largest amount a stored money column holds, 9 999 999 999.99
/// (`NUMERIC(12, 2)`).
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2);

/// Round an amount to the currency's two minor-unit places.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `amount × rate / 100`, rounded to money precision. `None` on overflow.
#[must_use]
pub fn percent_of(amount: Decimal, rate: Decimal) -> Option<Decimal> {
    amount
        .checked_mul(rate)?
        .checked_div(Decimal::ONE_HUNDRED)
        .map(round_money)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_money_half_away_from_zero() {
        assert_eq!(round_money(Decimal::new(10_005, 3)), Decimal::new(1001, 2));
        assert_eq!(round_money(Decimal::new(10_004, 3)), Decimal::new(1000, 2));
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(
            percent_of(Decimal::from(1800), Decimal::new(25, 1)),
            Some(Decimal::from(45))
        );
        assert_eq!(
            percent_of(Decimal::new(999, 1), Decimal::from(18)),
            Some(Decimal::new(1798, 2))
        );
    }

    #[test]
    fn test_percent_of_overflow() {
        assert_eq!(percent_of(Decimal::MAX, Decimal::from(50)), None);
    }

    #[test]
    fn test_max_amount() {
        assert_eq!(MAX_AMOUNT, Decimal::new(999_999_999_999, 2));
    }
}
