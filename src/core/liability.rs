//! The liability snapshot written at the end of a calculation run.

use super::breakdown::{BreakdownStep, StepInputs};
use super::error::CalculationError;
use super::income::{ReturnId, TaxReturn};
use super::money::format_gbp;
use super::rates::{RateTable, TaxYear};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Figures produced by the calculators, before totals are derived
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LiabilityFigures {
    pub gross_income: Decimal,
    pub net_income: Decimal,
    pub adjusted_net_income: Decimal,

    pub trading_allowance: Decimal,
    pub furnished_property_relief: Decimal,
    pub pension_contributions_gross: Decimal,
    pub pension_relief_at_source: Decimal,
    pub gift_aid_gross: Decimal,
    pub gift_aid_band_extension: Decimal,
    pub personal_allowance: Decimal,
    pub taxable_income: Decimal,

    pub basic_rate_tax: Decimal,
    pub higher_rate_tax: Decimal,
    pub additional_rate_tax: Decimal,

    pub savings_allowance: Decimal,
    pub taxable_interest: Decimal,
    pub savings_interest_tax: Decimal,
    pub dividend_allowance: Decimal,
    pub taxable_dividends: Decimal,
    pub dividend_basic_tax: Decimal,
    pub dividend_higher_tax: Decimal,
    pub dividend_additional_tax: Decimal,
    pub total_dividend_tax: Decimal,

    pub marriage_allowance_reduction: Decimal,
    pub married_couples_allowance_relief: Decimal,

    pub class_1_ni: Decimal,
    pub class_2_ni: Decimal,
    pub class_4_ni: Decimal,

    pub hicbc_charge: Decimal,
    pub tax_paid_at_source: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Liability {
    pub tax_return_id: ReturnId,
    pub tax_year: TaxYear,
    pub run: u32,
    pub calculated_at: DateTime<Utc>,
    pub calculated_by: String,
    /// SHA-256 of the return and rate table that produced this snapshot
    pub input_digest: String,

    #[serde(flatten)]
    pub figures: LiabilityFigures,

    /// Non-savings band tax only: basic + higher + additional
    pub total_income_tax: Decimal,
    pub investment_income_tax: Decimal,
    /// Credits against income tax, capped so they never take it below zero
    pub tax_reductions: Decimal,
    pub total_ni: Decimal,
    pub total_tax_and_ni: Decimal,
    pub net_liability: Decimal,
}

impl Liability {
    pub fn new(
        tax_return_id: ReturnId,
        tax_year: TaxYear,
        run: u32,
        input_digest: String,
        figures: LiabilityFigures,
    ) -> Self {
        let total_income_tax =
            figures.basic_rate_tax + figures.higher_rate_tax + figures.additional_rate_tax;
        let investment_income_tax = figures.savings_interest_tax + figures.total_dividend_tax;
        let tax_reductions = (figures.marriage_allowance_reduction
            + figures.married_couples_allowance_relief)
            .min(total_income_tax + investment_income_tax);
        let total_ni = figures.class_1_ni + figures.class_2_ni + figures.class_4_ni;
        let total_tax_and_ni = total_income_tax + investment_income_tax - tax_reductions
            + total_ni
            + figures.hicbc_charge;
        let net_liability = total_tax_and_ni - figures.tax_paid_at_source;

        Liability {
            tax_return_id,
            tax_year,
            run,
            calculated_at: Utc::now(),
            calculated_by: "auto".to_string(),
            input_digest,
            figures,
            total_income_tax,
            investment_income_tax,
            tax_reductions,
            total_ni,
            total_tax_and_ni,
            net_liability,
        }
    }

    pub fn owes_tax(&self) -> bool {
        self.net_liability >= dec!(0.01)
    }

    pub fn refund_due(&self) -> bool {
        self.net_liability <= dec!(-0.01)
    }

    pub fn balanced(&self) -> bool {
        self.net_liability.abs() < dec!(0.01)
    }

    pub fn summary(&self) -> LiabilitySummary<'_> {
        LiabilitySummary {
            liability: self,
            owes_tax: self.owes_tax(),
            refund_due: self.refund_due(),
            balanced: self.balanced(),
        }
    }
}

/// Serialisable view of every figure plus the settlement flags
#[derive(Debug, Serialize)]
pub struct LiabilitySummary<'a> {
    #[serde(flatten)]
    pub liability: &'a Liability,
    pub owes_tax: bool,
    pub refund_due: bool,
    pub balanced: bool,
}

impl BreakdownStep for Liability {
    fn step_key(&self) -> &'static str {
        "final_liability"
    }

    fn inputs(&self) -> StepInputs {
        StepInputs::new()
            .amount("total_income_tax", self.total_income_tax)
            .amount("investment_income_tax", self.investment_income_tax)
            .amount("tax_reductions", self.tax_reductions)
            .amount("total_ni", self.total_ni)
            .amount("hicbc_charge", self.figures.hicbc_charge)
            .amount("total_tax_and_ni", self.total_tax_and_ni)
            .amount("tax_paid_at_source", self.figures.tax_paid_at_source)
    }

    fn result(&self) -> Decimal {
        self.net_liability
    }

    fn explanation(&self) -> String {
        let position = if self.owes_tax() {
            "owed"
        } else if self.refund_due() {
            "refund due"
        } else {
            "balanced"
        };
        format!(
            "Final Liability: {} tax and NI - {} paid at source = {} ({})",
            format_gbp(self.total_tax_and_ni),
            format_gbp(self.figures.tax_paid_at_source),
            format_gbp(self.net_liability),
            position
        )
    }
}

/// Hex SHA-256 of the canonical JSON of the return and rate table.
pub fn input_digest(tax_return: &TaxReturn, rates: &RateTable) -> Result<String, CalculationError> {
    // serde_json::Value objects keep keys sorted, which makes the encoding canonical
    let canonical = serde_json::json!({
        "tax_return": tax_return,
        "rate_table": rates,
    });
    let bytes =
        serde_json::to_vec(&canonical).map_err(|e| CalculationError::Fingerprint(e.to_string()))?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}
