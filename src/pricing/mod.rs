//! Offer selection, line pricing and preview revalidation.

pub mod calculator;
pub mod selector;
pub mod validator;

#[cfg(test)]
pub(crate) mod test_support;

pub use calculator::{AppliedOffer, LinePricing, calculate, price_line};
pub use selector::{ScoredOffer, select_best};
pub use validator::{RepricedLine, Revalidation, revalidate};

use rust_decimal::Decimal;

use crate::money::round_money;

/// Percent reward: the block discount is rounded before it is multiplied.
pub fn percent_discount(unit_price: Decimal, min_qty: i32, percent: Decimal, multiplier: i32) -> Decimal {
    let per_block = round_money(Decimal::from(min_qty) * unit_price * percent / Decimal::ONE_HUNDRED);
    round_money(per_block * Decimal::from(multiplier))
}

pub fn fixed_discount(amount: Decimal, multiplier: i32) -> Decimal {
    round_money(amount * Decimal::from(multiplier))
}
