//! Conversions between decimal amounts and stored minor units.
//!
//! Prices and order totals are exposed as `Decimal` with two fractional
//! digits and persisted as whole paise.

use anyhow::{Context, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Number of fractional digits carried by every amount.
pub const SCALE: u32 = 2;

/// Decimal amount from stored minor units.
pub fn from_minor(minor: i64) -> Decimal {
    Decimal::new(minor, SCALE)
}

/// Minor units for a decimal amount, rounded to the nearest paisa.
pub fn to_minor(amount: Decimal) -> Result<i64> {
    amount
        .round_dp(SCALE)
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|minor| minor.to_i64())
        .with_context(|| format!("Amount out of range: {}", amount))
}

/// Largest amount that fits in stored minor units
pub fn max_amount() -> Decimal {
    from_minor(i64::MAX)
}
