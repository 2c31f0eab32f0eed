use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// Round to whole pence, half away from zero.
pub fn pence(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `amount × percentage / 100`, unrounded.
pub fn percent_of(amount: Decimal, percentage: Decimal) -> Decimal {
    amount * percentage / dec!(100)
}

pub fn format_gbp(amount: Decimal) -> String {
    if amount.is_sign_negative() && !amount.is_zero() {
        format!("-£{:.2}", amount.abs())
    } else {
        format!("£{:.2}", amount)
    }
}
