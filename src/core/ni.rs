//! National Insurance contributions: Class 1 on employment, Classes 2 and 4 on self-employment.

use super::breakdown::{BreakdownStep, StepInputs};
use super::error::{ensure_amount, CalculationError};
use super::money::{format_gbp, pence, percent_of};
use super::rates::RateTable;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NiClass {
    Class1,
    Class4,
}

/// A contribution charged at a main rate between two thresholds and a lower rate above.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TieredContribution {
    pub class: NiClass,
    pub income: Decimal,
    pub lower_threshold: Decimal,
    pub upper_threshold: Decimal,
    pub main_rate: Decimal,
    pub upper_rate: Decimal,
    pub main_contribution: Decimal,
    pub upper_contribution: Decimal,
    pub contribution: Decimal,
}

impl TieredContribution {
    fn compute(
        class: NiClass,
        income: Decimal,
        lower_threshold: Decimal,
        upper_threshold: Decimal,
        main_rate: Decimal,
        upper_rate: Decimal,
    ) -> Self {
        let main_slice = (income.min(upper_threshold) - lower_threshold).max(Decimal::ZERO);
        let upper_slice = (income - upper_threshold).max(Decimal::ZERO);
        let main_contribution = pence(percent_of(main_slice, main_rate));
        let upper_contribution = pence(percent_of(upper_slice, upper_rate));

        TieredContribution {
            class,
            income,
            lower_threshold,
            upper_threshold,
            main_rate,
            upper_rate,
            main_contribution,
            upper_contribution,
            contribution: main_contribution + upper_contribution,
        }
    }
}

impl BreakdownStep for TieredContribution {
    fn step_key(&self) -> &'static str {
        match self.class {
            NiClass::Class1 => "class_1_ni",
            NiClass::Class4 => "class_4_ni",
        }
    }

    fn inputs(&self) -> StepInputs {
        let label = match self.class {
            NiClass::Class1 => "employment_income",
            NiClass::Class4 => "trading_profit",
        };
        StepInputs::new()
            .amount(label, self.income)
            .amount("lower_threshold", self.lower_threshold)
            .amount("upper_threshold", self.upper_threshold)
            .amount("main_contribution", self.main_contribution)
            .amount("upper_contribution", self.upper_contribution)
    }

    fn result(&self) -> Decimal {
        self.contribution
    }

    fn explanation(&self) -> String {
        let class = match self.class {
            NiClass::Class1 => "Class 1 NI",
            NiClass::Class4 => "Class 4 NI",
        };
        format!(
            "{}: {} at {}% + {} at {}% = {}",
            class,
            format_gbp(self.main_contribution),
            self.main_rate,
            format_gbp(self.upper_contribution),
            self.upper_rate,
            format_gbp(self.contribution)
        )
    }
}

/// Flat Class 2 contribution, due only when profits exceed the threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassTwoContribution {
    pub trading_profit: Decimal,
    pub threshold: Decimal,
    pub contribution: Decimal,
}

impl BreakdownStep for ClassTwoContribution {
    fn step_key(&self) -> &'static str {
        "class_2_ni"
    }

    fn inputs(&self) -> StepInputs {
        StepInputs::new()
            .amount("trading_profit", self.trading_profit)
            .amount("threshold", self.threshold)
    }

    fn result(&self) -> Decimal {
        self.contribution
    }

    fn explanation(&self) -> String {
        if self.contribution.is_zero() {
            format!(
                "Class 2 NI: none (profits {} not above {})",
                format_gbp(self.trading_profit),
                format_gbp(self.threshold)
            )
        } else {
            format!("Class 2 NI: flat {}", format_gbp(self.contribution))
        }
    }
}

pub struct NationalInsuranceCalculator<'a> {
    rates: &'a RateTable,
}

impl<'a> NationalInsuranceCalculator<'a> {
    pub fn new(rates: &'a RateTable) -> Self {
        Self { rates }
    }

    pub fn class_1(&self, employment_income: Decimal) -> Result<TieredContribution, CalculationError> {
        let income = ensure_amount("employment", employment_income)?;
        let ni = TieredContribution::compute(
            NiClass::Class1,
            income,
            self.rates.ni_lower_threshold,
            self.rates.ni_upper_threshold,
            self.rates.ni_basic_rate,
            self.rates.ni_higher_rate,
        );
        log::debug!("Class 1 NI on {}: {}", income, ni.contribution);
        Ok(ni)
    }

    pub fn class_2(&self, trading_profit: Decimal) -> Result<ClassTwoContribution, CalculationError> {
        let profit = ensure_amount("self_employment", trading_profit)?;
        let threshold = self.rates.class_2_threshold;
        let contribution = if profit > threshold {
            self.rates.class_2_flat_amount
        } else {
            Decimal::ZERO
        };
        log::debug!("Class 2 NI on {}: {}", profit, contribution);
        Ok(ClassTwoContribution {
            trading_profit: profit,
            threshold,
            contribution,
        })
    }

    pub fn class_4(&self, trading_profit: Decimal) -> Result<TieredContribution, CalculationError> {
        let profit = ensure_amount("self_employment", trading_profit)?;
        let ni = TieredContribution::compute(
            NiClass::Class4,
            profit,
            self.rates.class_4_lower_threshold,
            self.rates.class_4_upper_threshold,
            self.rates.class_4_basic_rate,
            self.rates.class_4_higher_rate,
        );
        log::debug!("Class 4 NI on {}: {}", profit, ni.contribution);
        Ok(ni)
    }
}
