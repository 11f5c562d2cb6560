//! Money arithmetic for subtotal and rollup computation.
//!
//! All monetary derivations live here so that every store implementation
//! produces identical cents for the same inputs.

use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places carried by every monetary amount.
pub const MONEY_SCALE: u32 = 2;

/// Round an amount to cents, midpoints away from zero.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Subtotal of one detail line: `rate * quantity + overtime + fringes`,
/// rounded to cents. Missing overtime and fringe amounts count as zero.
#[must_use]
pub fn subtotal_of(
    rate: Decimal,
    quantity: Decimal,
    overtime: Option<Decimal>,
    fringes: Option<Decimal>,
) -> Decimal {
    let overtime = overtime.unwrap_or_default();
    let fringes = fringes.unwrap_or_default();
    round_money(rate * quantity + overtime + fringes)
}
