//! Monetary rounding rules
//!
//! Every derived amount is rounded to cents at the step that produces it, not
//! once at the end. Ties round toward positive infinity, so `2.345 → 2.35` and
//! `-2.345 → -2.34`.

use rust_decimal::{Decimal, RoundingStrategy};

/// Two-sided tolerance used for "effectively zero" and amount matching (0.01)
pub const TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Largest accepted magnitude for an input amount (1e12)
///
/// Keeps every sum and share the engine derives far inside `Decimal` range.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_1000, 0xE8, 0, false, 0);

/// Round to two decimal places, ties toward +infinity
pub fn round2(value: Decimal) -> Decimal {
    let strategy = if value.is_sign_negative() {
        RoundingStrategy::MidpointTowardZero
    } else {
        RoundingStrategy::MidpointAwayFromZero
    };
    value.round_dp_with_strategy(2, strategy)
}

/// Render an amount with exactly two decimals (no currency symbol)
pub fn format_amount(value: Decimal) -> String {
    let mut rounded = round2(value);
    rounded.rescale(2);
    rounded.to_string()
}

/// True when `|value|` does not exceed [`MAX_AMOUNT`]
pub fn in_range(value: Decimal) -> bool {
    value.abs() <= MAX_AMOUNT
}

/// True when `a` and `b` differ by no more than [`TOLERANCE`]
pub fn within_tolerance(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() <= TOLERANCE
}
