//! Allocation of taxable non-savings income across the progressive rate bands.

use super::breakdown::{BreakdownStep, StepInputs};
use super::error::{ensure_amount, CalculationError};
use super::money::{format_gbp, pence, percent_of};
use super::rates::{RateTable, TaxBand};
use rust_decimal::Decimal;
use serde::Serialize;

/// Band boundaries on taxable income for one calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BandLimits {
    /// Basic/higher boundary, widened by any Gift Aid extension
    pub basic: Decimal,
    /// Higher/additional boundary, never widened
    pub higher: Decimal,
}

impl BandLimits {
    pub fn new(rates: &RateTable, gift_aid_band_extension: Decimal) -> Self {
        BandLimits {
            basic: rates.basic_rate_limit + gift_aid_band_extension,
            higher: rates.higher_rate_limit,
        }
    }

    /// Band that the top slice of `taxable` falls in
    pub fn band_for(&self, taxable: Decimal) -> TaxBand {
        if taxable <= self.basic {
            TaxBand::Basic
        } else if taxable <= self.higher {
            TaxBand::Higher
        } else {
            TaxBand::Additional
        }
    }

    /// Width of the higher band, zero when the extension swallows it
    pub fn higher_width(&self) -> Decimal {
        (self.higher - self.basic).max(Decimal::ZERO)
    }
}

/// Income at each resolution stage, ending with the taxable non-savings figure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxableIncome {
    pub gross_income: Decimal,
    pub net_income: Decimal,
    pub adjusted_net_income: Decimal,
    pub non_savings_income: Decimal,
    pub pension_contributions_gross: Decimal,
    pub personal_allowance: Decimal,
    pub non_savings_taxable: Decimal,
    /// Allowance left once non-savings income is covered, carried to savings then dividends
    pub unused_allowance: Decimal,
}

impl TaxableIncome {
    pub fn resolve(
        gross_income: Decimal,
        net_income: Decimal,
        adjusted_net_income: Decimal,
        non_savings_income: Decimal,
        pension_contributions_gross: Decimal,
        personal_allowance: Decimal,
    ) -> Self {
        let non_savings_taxable = pence(
            (non_savings_income - pension_contributions_gross - personal_allowance)
                .max(Decimal::ZERO),
        );
        let unused_allowance = pence(
            (personal_allowance + pension_contributions_gross - non_savings_income)
                .max(Decimal::ZERO),
        );
        TaxableIncome {
            gross_income,
            net_income,
            adjusted_net_income,
            non_savings_income,
            pension_contributions_gross,
            personal_allowance,
            non_savings_taxable,
            unused_allowance,
        }
    }
}

impl BreakdownStep for TaxableIncome {
    fn step_key(&self) -> &'static str {
        "taxable_income"
    }

    fn inputs(&self) -> StepInputs {
        StepInputs::new()
            .amount("gross_income", self.gross_income)
            .amount("net_income", self.net_income)
            .amount("adjusted_net_income", self.adjusted_net_income)
            .amount("non_savings_income", self.non_savings_income)
            .amount("pension_contributions_gross", self.pension_contributions_gross)
            .amount("personal_allowance", self.personal_allowance)
            .amount("unused_allowance", self.unused_allowance)
    }

    fn result(&self) -> Decimal {
        self.non_savings_taxable
    }

    fn explanation(&self) -> String {
        format!(
            "Taxable Income: {} non-savings - {} pension - {} allowance = {}",
            format_gbp(self.non_savings_income),
            format_gbp(self.pension_contributions_gross),
            format_gbp(self.personal_allowance),
            format_gbp(self.non_savings_taxable)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandAllocation {
    pub taxable_income: Decimal,
    pub band_extension: Decimal,
    pub limits: BandLimits,
    pub basic_amount: Decimal,
    pub higher_amount: Decimal,
    pub additional_amount: Decimal,
    pub basic_tax: Decimal,
    pub higher_tax: Decimal,
    pub additional_tax: Decimal,
    /// Always `basic_tax + higher_tax + additional_tax`
    pub total: Decimal,
}

pub struct TaxBandCalculator<'a> {
    rates: &'a RateTable,
}

impl<'a> TaxBandCalculator<'a> {
    pub fn new(rates: &'a RateTable) -> Self {
        Self { rates }
    }

    pub fn calculate(&self, taxable_income: Decimal) -> BandAllocation {
        self.allocate(taxable_income, Decimal::ZERO)
    }

    /// Allocate with the basic band widened by a Gift Aid extension.
    pub fn calculate_with_extension(
        &self,
        taxable_income: Decimal,
        gift_aid_band_extension: Decimal,
    ) -> Result<BandAllocation, CalculationError> {
        let extension = ensure_amount("gift_aid_band_extension", gift_aid_band_extension)?;
        Ok(self.allocate(taxable_income, extension))
    }

    fn allocate(&self, taxable_income: Decimal, extension: Decimal) -> BandAllocation {
        let limits = BandLimits::new(self.rates, extension);
        let taxable = taxable_income.max(Decimal::ZERO);

        let basic_amount = taxable.min(limits.basic);
        let higher_amount = (taxable.min(limits.higher) - limits.basic).max(Decimal::ZERO);
        let additional_amount = (taxable - limits.basic.max(limits.higher)).max(Decimal::ZERO);

        let basic_tax = pence(percent_of(basic_amount, self.rates.basic_rate));
        let higher_tax = pence(percent_of(higher_amount, self.rates.higher_rate));
        let additional_tax = pence(percent_of(additional_amount, self.rates.additional_rate));
        let total = basic_tax + higher_tax + additional_tax;

        log::debug!(
            "Bands on {}: basic {}@{}%={}, higher {}@{}%={}, additional {}@{}%={}",
            taxable,
            basic_amount,
            self.rates.basic_rate,
            basic_tax,
            higher_amount,
            self.rates.higher_rate,
            higher_tax,
            additional_amount,
            self.rates.additional_rate,
            additional_tax
        );

        BandAllocation {
            taxable_income: taxable,
            band_extension: extension,
            limits,
            basic_amount,
            higher_amount,
            additional_amount,
            basic_tax,
            higher_tax,
            additional_tax,
            total,
        }
    }
}

impl BreakdownStep for BandAllocation {
    fn step_key(&self) -> &'static str {
        "tax_band_calculation"
    }

    fn inputs(&self) -> StepInputs {
        StepInputs::new()
            .amount("taxable_income", self.taxable_income)
            .amount("gift_aid_band_extension", self.band_extension)
            .amount("adjusted_basic_limit", self.limits.basic)
            .amount("higher_limit", self.limits.higher)
            .amount("basic_tax", self.basic_tax)
            .amount("higher_tax", self.higher_tax)
            .amount("additional_tax", self.additional_tax)
    }

    fn result(&self) -> Decimal {
        self.total
    }

    fn explanation(&self) -> String {
        format!(
            "Income Tax: basic {} + higher {} + additional {} = {}",
            format_gbp(self.basic_tax),
            format_gbp(self.higher_tax),
            format_gbp(self.additional_tax),
            format_gbp(self.total)
        )
    }
}
