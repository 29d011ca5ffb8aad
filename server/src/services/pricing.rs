// server/src/services/pricing.rs

//! Authoritative order totals and the 2dp amount comparison.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::CatalogItem;

/// Rounds to two places and renders with exactly two digits after the point.
pub fn format_amount(amount: Decimal) -> String {
  let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
  rounded.rescale(2);
  rounded.to_string()
}

/// Sum of unit price times quantity, rounded to two places.
pub fn authoritative_amount<'a>(lines: impl IntoIterator<Item = (&'a CatalogItem, u32)>) -> Decimal {
  let total: Decimal = lines
    .into_iter()
    .map(|(item, quantity)| item.unit_price * Decimal::from(quantity))
    .sum();
  total.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn amounts_match(declared: Decimal, authoritative: Decimal) -> bool {
  format_amount(declared) == format_amount(authoritative)
}
