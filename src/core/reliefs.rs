//! Reliefs that reduce a specific income stream, and the High Income Child Benefit Charge.

use super::breakdown::{BreakdownStep, StepInputs};
use super::error::{ensure_amount, CalculationError};
use super::money::{format_gbp, pence, percent_of};
use super::rates::RateTable;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradingAllowance {
    pub opted_in: bool,
    pub trading_income_gross: Decimal,
    pub allowance: Decimal,
    pub trading_income_net: Decimal,
}

pub struct TradingAllowanceCalculator<'a> {
    rates: &'a RateTable,
}

impl<'a> TradingAllowanceCalculator<'a> {
    pub fn new(rates: &'a RateTable) -> Self {
        Self { rates }
    }

    /// Deduct up to the trading allowance from self-employment income when the return opts in.
    /// Without the election the income passes through unchanged.
    pub fn calculate(
        &self,
        trading_income: Decimal,
        opted_in: bool,
    ) -> Result<TradingAllowance, CalculationError> {
        let gross = ensure_amount("self_employment", trading_income)?;
        let allowance = if opted_in {
            gross.min(self.rates.trading_allowance)
        } else {
            Decimal::ZERO
        };

        Ok(TradingAllowance {
            opted_in,
            trading_income_gross: gross,
            allowance,
            trading_income_net: gross - allowance,
        })
    }
}

impl BreakdownStep for TradingAllowance {
    fn step_key(&self) -> &'static str {
        "trading_allowance"
    }

    fn inputs(&self) -> StepInputs {
        StepInputs::new()
            .flag("opted_in", self.opted_in)
            .amount("trading_income_gross", self.trading_income_gross)
            .amount("trading_income_net", self.trading_income_net)
    }

    fn result(&self) -> Decimal {
        self.allowance
    }

    fn explanation(&self) -> String {
        if !self.opted_in {
            return "Trading Allowance: not claimed".to_string();
        }
        format!(
            "Trading Allowance: {} deducted from trading income of {}",
            format_gbp(self.allowance),
            format_gbp(self.trading_income_gross)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FurnishedPropertyRelief {
    pub rental_income: Decimal,
    pub relief_rate: Decimal,
    pub relief: Decimal,
    pub taxable_rental: Decimal,
}

pub struct FurnishedPropertyCalculator<'a> {
    rates: &'a RateTable,
}

impl<'a> FurnishedPropertyCalculator<'a> {
    pub fn new(rates: &'a RateTable) -> Self {
        Self { rates }
    }

    /// Relief is a flat percentage of gross rental income. Zero or negative income gets no relief.
    pub fn calculate(&self, rental_income: Decimal) -> FurnishedPropertyRelief {
        let relief_rate = self.rates.ftcr_relief_rate;
        if rental_income <= Decimal::ZERO {
            return FurnishedPropertyRelief {
                rental_income,
                relief_rate,
                relief: Decimal::ZERO,
                taxable_rental: Decimal::ZERO,
            };
        }

        let relief = pence(percent_of(rental_income, relief_rate));
        FurnishedPropertyRelief {
            rental_income,
            relief_rate,
            relief,
            taxable_rental: rental_income - relief,
        }
    }
}

impl BreakdownStep for FurnishedPropertyRelief {
    fn step_key(&self) -> &'static str {
        "furnished_property_relief"
    }

    fn inputs(&self) -> StepInputs {
        StepInputs::new()
            .amount("rental_income", self.rental_income)
            .amount("relief_rate", self.relief_rate)
            .amount("taxable_rental", self.taxable_rental)
    }

    fn result(&self) -> Decimal {
        self.relief
    }

    fn explanation(&self) -> String {
        format!(
            "Furnished Property Relief: {} × {}% = {}, taxable rental {}",
            format_gbp(self.rental_income),
            self.relief_rate,
            format_gbp(self.relief),
            format_gbp(self.taxable_rental)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChildBenefitCharge {
    pub adjusted_net_income: Decimal,
    pub child_benefit: Decimal,
    pub threshold: Decimal,
    pub excess_income: Decimal,
    /// Share of the benefit clawed back, between 0 and 1
    pub charge_fraction: Decimal,
    pub charge: Decimal,
}

pub struct HighIncomeChildBenefitCalculator<'a> {
    rates: &'a RateTable,
}

impl<'a> HighIncomeChildBenefitCalculator<'a> {
    pub fn new(rates: &'a RateTable) -> Self {
        Self { rates }
    }

    /// 1% of the benefit for every step of income over the threshold, never more than the benefit.
    pub fn calculate(
        &self,
        adjusted_net_income: Decimal,
        child_benefit: Decimal,
    ) -> Result<ChildBenefitCharge, CalculationError> {
        let income = ensure_amount("adjusted_net_income", adjusted_net_income)?;
        let benefit = ensure_amount("child_benefit_received", child_benefit)?;
        let threshold = self.rates.hicbc_threshold;
        let excess = (income - threshold).max(Decimal::ZERO);

        let charge_fraction = if excess.is_zero() || benefit.is_zero() {
            Decimal::ZERO
        } else {
            (excess / self.rates.hicbc_income_step / dec!(100))
                .round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
                .min(Decimal::ONE)
        };
        let charge = pence(benefit * charge_fraction).min(benefit);

        if !charge.is_zero() {
            log::debug!(
                "HICBC: income {} over threshold by {}, charge {}",
                income,
                excess,
                charge
            );
        }

        Ok(ChildBenefitCharge {
            adjusted_net_income: income,
            child_benefit: benefit,
            threshold,
            excess_income: excess,
            charge_fraction,
            charge,
        })
    }
}

impl BreakdownStep for ChildBenefitCharge {
    fn step_key(&self) -> &'static str {
        "hicbc_charge"
    }

    fn inputs(&self) -> StepInputs {
        StepInputs::new()
            .amount("adjusted_net_income", self.adjusted_net_income)
            .amount("child_benefit", self.child_benefit)
            .amount("threshold", self.threshold)
            .amount("excess_income", self.excess_income)
            .amount("charge_fraction", self.charge_fraction)
    }

    fn result(&self) -> Decimal {
        self.charge
    }

    fn explanation(&self) -> String {
        if self.charge.is_zero() {
            return format!(
                "High Income Child Benefit Charge: none (income {} within {} threshold)",
                format_gbp(self.adjusted_net_income),
                format_gbp(self.threshold)
            );
        }
        format!(
            "High Income Child Benefit Charge: {}% of {} child benefit = {}",
            (self.charge_fraction * dec!(100)).normalize(),
            format_gbp(self.child_benefit),
            format_gbp(self.charge)
        )
    }
}
