//! Monetary rounding helpers shared by the pricing and protection modules.
//!
//! All amounts are `rust_decimal::Decimal` in currency units (not cents), so
//! percentages and fixed deltas compose without float drift.

use rust_decimal::{Decimal, RoundingStrategy};

/// Round to two decimal places, half away from zero.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Relative change from `previous` to `new`, in percent, rounded to 2 dp.
///
/// A non-positive `previous` yields zero instead of dividing by zero. Returns
/// `None` only when the result does not fit in a `Decimal`.
pub fn percentage_change(previous: Decimal, new: Decimal) -> Option<Decimal> {
    if previous <= Decimal::ZERO {
        return Some(Decimal::ZERO);
    }
    let change = new.checked_sub(previous)?;
    let ratio = change.checked_div(previous)?;
    ratio.checked_mul(Decimal::ONE_HUNDRED).map(round2)
}
