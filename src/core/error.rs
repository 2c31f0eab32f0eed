use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Largest amount accepted anywhere in a calculation. Products and quotients of amounts this
/// size with any rate stay well inside `Decimal`'s range.
pub const MAX_AMOUNT: Decimal = dec!(1000000000000000);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CalculationError {
    #[error("negative amount for {field}: {amount}")]
    NegativeAmount { field: &'static str, amount: Decimal },
    #[error("amount for {field} exceeds the supported maximum")]
    Overflow { field: &'static str },
    #[error("invalid rate table: {0}")]
    InvalidRateTable(String),
    #[error("married couple's allowance claimed without a spouse date of birth")]
    MissingSpouseDob,
    #[error("failed to fingerprint inputs: {0}")]
    Fingerprint(String),
    #[error("store failure: {0}")]
    Store(String),
}

/// Reject negative gross figures and anything above [`MAX_AMOUNT`]. Negatives indicate an
/// upstream data bug, not a tax position.
pub(crate) fn ensure_amount(
    field: &'static str,
    amount: Decimal,
) -> Result<Decimal, CalculationError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        Err(CalculationError::NegativeAmount { field, amount })
    } else if amount > MAX_AMOUNT {
        Err(CalculationError::Overflow { field })
    } else {
        Ok(amount)
    }
}

/// `total + amount`, failing once the running total leaves the supported range.
pub(crate) fn add_amount(
    field: &'static str,
    total: Decimal,
    amount: Decimal,
) -> Result<Decimal, CalculationError> {
    total
        .checked_add(amount)
        .filter(|sum| *sum <= MAX_AMOUNT)
        .ok_or(CalculationError::Overflow { field })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_positive_amounts_pass() {
        assert_eq!(ensure_amount("x", dec!(0)), Ok(dec!(0)));
        assert_eq!(ensure_amount("x", dec!(12.5)), Ok(dec!(12.5)));
    }

    #[test]
    fn negative_amount_rejected() {
        assert_eq!(
            ensure_amount("employment", dec!(-1)),
            Err(CalculationError::NegativeAmount {
                field: "employment",
                amount: dec!(-1)
            })
        );
    }

    #[test]
    fn amount_above_maximum_rejected() {
        assert_eq!(ensure_amount("x", MAX_AMOUNT), Ok(MAX_AMOUNT));
        assert_eq!(
            ensure_amount("employment", Decimal::MAX),
            Err(CalculationError::Overflow { field: "employment" })
        );
    }

    #[test]
    fn running_total_overflow_rejected() {
        assert_eq!(add_amount("gross", dec!(10), dec!(5)), Ok(dec!(15)));
        assert_eq!(
            add_amount("gross", MAX_AMOUNT, dec!(1)),
            Err(CalculationError::Overflow { field: "gross" })
        );
        assert_eq!(
            add_amount("gross", Decimal::MAX, dec!(1)),
            Err(CalculationError::Overflow { field: "gross" })
        );
    }
}
