//! Fixed-point money helpers.
//!
//! Every monetary step rounds to two decimal places, half away from zero,
//! on exact decimal values so `.xx5` boundaries are reproducible.

use rust_decimal::{Decimal, RoundingStrategy};

pub const DECIMAL_PLACES: u32 = 2;

/// Largest unit price drift between preview and confirm that is still accepted.
pub const PRICE_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// True when two prices differ by more than [`PRICE_TOLERANCE`].
pub fn price_drifted(previous: Decimal, current: Decimal) -> bool {
    (current - previous).abs() > PRICE_TOLERANCE
}
