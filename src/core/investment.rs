//! Savings and dividend allowances, and tax on investment income.
//!
//! Non-savings income takes band room first, savings interest second and dividends last. Each
//! later category is only offered the room the earlier ones left behind.

use super::bands::BandLimits;
use super::breakdown::{BreakdownStep, StepInputs};
use super::money::{format_gbp, pence, percent_of};
use super::rates::{RateTable, TaxBand};
use rust_decimal::Decimal;
use serde::Serialize;

/// Amount allocated to each band
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BandSlices {
    pub basic: Decimal,
    pub higher: Decimal,
    pub additional: Decimal,
}

impl BandSlices {
    pub fn total(&self) -> Decimal {
        self.basic + self.higher + self.additional
    }
}

/// Remaining room in the basic and higher bands. Additional-rate room is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandRoom {
    basic: Decimal,
    higher: Decimal,
}

impl BandRoom {
    /// Room left once `non_savings_taxable` has been allocated
    pub fn after_non_savings(limits: &BandLimits, non_savings_taxable: Decimal) -> Self {
        let mut room = BandRoom {
            basic: limits.basic,
            higher: limits.higher_width(),
        };
        room.allocate(non_savings_taxable.max(Decimal::ZERO));
        room
    }

    pub fn basic(&self) -> Decimal {
        self.basic
    }

    pub fn higher(&self) -> Decimal {
        self.higher
    }

    /// Fill basic room, then higher room, then spill into the additional band.
    pub fn allocate(&mut self, amount: Decimal) -> BandSlices {
        if amount <= Decimal::ZERO {
            return BandSlices::default();
        }
        let basic = amount.min(self.basic);
        self.basic -= basic;
        let higher = (amount - basic).min(self.higher);
        self.higher -= higher;
        BandSlices {
            basic,
            higher,
            additional: amount - basic - higher,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavingsAllowance {
    pub gross_interest: Decimal,
    pub non_savings_taxable: Decimal,
    /// Personal allowance left over by non-savings income and set against interest
    pub personal_allowance_used: Decimal,
    /// Marginal band of non-savings income that sized the allowance
    pub taxpayer_band: TaxBand,
    pub personal_savings_allowance: Decimal,
    pub allowance: Decimal,
    pub taxable_interest: Decimal,
}

pub struct SavingsAllowanceCalculator<'a> {
    rates: &'a RateTable,
}

impl<'a> SavingsAllowanceCalculator<'a> {
    pub fn new(rates: &'a RateTable) -> Self {
        Self { rates }
    }

    /// Personal Savings Allowance sized by the band non-savings income alone reaches, using the
    /// statutory limits. Gift Aid widens band room but never changes the allowance.
    ///
    /// Personal allowance not used by non-savings income comes off the interest first.
    pub fn calculate(
        &self,
        gross_interest: Decimal,
        non_savings_taxable: Decimal,
        unused_personal_allowance: Decimal,
    ) -> SavingsAllowance {
        let taxpayer_band =
            BandLimits::new(self.rates, Decimal::ZERO).band_for(non_savings_taxable);
        if gross_interest <= Decimal::ZERO {
            return SavingsAllowance {
                gross_interest,
                non_savings_taxable,
                personal_allowance_used: Decimal::ZERO,
                taxpayer_band,
                personal_savings_allowance: Decimal::ZERO,
                allowance: Decimal::ZERO,
                taxable_interest: Decimal::ZERO,
            };
        }

        let personal_allowance_used =
            gross_interest.min(unused_personal_allowance.max(Decimal::ZERO));
        let remaining = gross_interest - personal_allowance_used;
        let psa = match taxpayer_band {
            TaxBand::Basic => self.rates.psa_basic,
            TaxBand::Higher => self.rates.psa_higher,
            TaxBand::Additional => self.rates.psa_additional,
        };
        let allowance = remaining.min(psa);

        SavingsAllowance {
            gross_interest,
            non_savings_taxable,
            personal_allowance_used,
            taxpayer_band,
            personal_savings_allowance: psa,
            allowance,
            taxable_interest: (remaining - allowance).max(Decimal::ZERO),
        }
    }
}

impl BreakdownStep for SavingsAllowance {
    fn step_key(&self) -> &'static str {
        "savings_allowance"
    }

    fn inputs(&self) -> StepInputs {
        StepInputs::new()
            .amount("gross_interest", self.gross_interest)
            .amount("non_savings_taxable", self.non_savings_taxable)
            .amount("personal_allowance_used", self.personal_allowance_used)
            .text("taxpayer_band", self.taxpayer_band.display())
            .amount("personal_savings_allowance", self.personal_savings_allowance)
            .amount("taxable_interest", self.taxable_interest)
    }

    fn result(&self) -> Decimal {
        self.allowance
    }

    fn explanation(&self) -> String {
        format!(
            "Personal Savings Allowance: {} ({} taxpayer), taxable interest {}",
            format_gbp(self.allowance),
            self.taxpayer_band.display(),
            format_gbp(self.taxable_interest)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DividendAllowance {
    pub gross_dividends: Decimal,
    /// Personal allowance still unused after savings income, set against dividends
    pub personal_allowance_used: Decimal,
    pub allowance: Decimal,
    pub taxable_dividends: Decimal,
}

pub struct DividendAllowanceCalculator<'a> {
    rates: &'a RateTable,
}

impl<'a> DividendAllowanceCalculator<'a> {
    pub fn new(rates: &'a RateTable) -> Self {
        Self { rates }
    }

    pub fn calculate(
        &self,
        gross_dividends: Decimal,
        unused_personal_allowance: Decimal,
    ) -> DividendAllowance {
        if gross_dividends <= Decimal::ZERO {
            return DividendAllowance {
                gross_dividends,
                personal_allowance_used: Decimal::ZERO,
                allowance: Decimal::ZERO,
                taxable_dividends: Decimal::ZERO,
            };
        }
        let personal_allowance_used =
            gross_dividends.min(unused_personal_allowance.max(Decimal::ZERO));
        let remaining = gross_dividends - personal_allowance_used;
        let allowance = remaining.min(self.rates.dividend_allowance);
        DividendAllowance {
            gross_dividends,
            personal_allowance_used,
            allowance,
            taxable_dividends: (remaining - allowance).max(Decimal::ZERO),
        }
    }
}

impl BreakdownStep for DividendAllowance {
    fn step_key(&self) -> &'static str {
        "dividend_allowance"
    }

    fn inputs(&self) -> StepInputs {
        StepInputs::new()
            .amount("gross_dividends", self.gross_dividends)
            .amount("personal_allowance_used", self.personal_allowance_used)
            .amount("taxable_dividends", self.taxable_dividends)
    }

    fn result(&self) -> Decimal {
        self.allowance
    }

    fn explanation(&self) -> String {
        format!(
            "Dividend Allowance: {} of {} dividends, taxable {}",
            format_gbp(self.allowance),
            format_gbp(self.gross_dividends),
            format_gbp(self.taxable_dividends)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvestmentIncomeTax {
    pub non_savings_taxable: Decimal,
    /// Band room left after non-savings income
    pub basic_room: Decimal,
    pub higher_room: Decimal,
    pub savings: BandSlices,
    pub savings_basic_tax: Decimal,
    pub savings_higher_tax: Decimal,
    pub savings_additional_tax: Decimal,
    pub savings_interest_tax: Decimal,
    pub dividends: BandSlices,
    pub dividend_basic_tax: Decimal,
    pub dividend_higher_tax: Decimal,
    pub dividend_additional_tax: Decimal,
    pub total_dividend_tax: Decimal,
    pub total: Decimal,
}

pub struct InvestmentIncomeTaxCalculator<'a> {
    rates: &'a RateTable,
}

impl<'a> InvestmentIncomeTaxCalculator<'a> {
    pub fn new(rates: &'a RateTable) -> Self {
        Self { rates }
    }

    /// Tax savings interest at the standard rates, then dividends at the dividend rates, each in
    /// the band room left by everything allocated before it.
    pub fn calculate(
        &self,
        non_savings_taxable: Decimal,
        taxable_interest: Decimal,
        taxable_dividends: Decimal,
        limits: &BandLimits,
    ) -> InvestmentIncomeTax {
        let mut room = BandRoom::after_non_savings(limits, non_savings_taxable);
        let basic_room = room.basic();
        let higher_room = room.higher();

        let savings = room.allocate(taxable_interest);
        let savings_basic_tax = self.tax(savings.basic, TaxBand::Basic, false);
        let savings_higher_tax = self.tax(savings.higher, TaxBand::Higher, false);
        let savings_additional_tax = self.tax(savings.additional, TaxBand::Additional, false);
        let savings_interest_tax = savings_basic_tax + savings_higher_tax + savings_additional_tax;

        let dividends = room.allocate(taxable_dividends);
        let dividend_basic_tax = self.tax(dividends.basic, TaxBand::Basic, true);
        let dividend_higher_tax = self.tax(dividends.higher, TaxBand::Higher, true);
        let dividend_additional_tax = self.tax(dividends.additional, TaxBand::Additional, true);
        let total_dividend_tax = dividend_basic_tax + dividend_higher_tax + dividend_additional_tax;

        log::debug!(
            "Investment income: savings {:?} tax {}, dividends {:?} tax {}",
            savings,
            savings_interest_tax,
            dividends,
            total_dividend_tax
        );

        InvestmentIncomeTax {
            non_savings_taxable,
            basic_room,
            higher_room,
            savings,
            savings_basic_tax,
            savings_higher_tax,
            savings_additional_tax,
            savings_interest_tax,
            dividends,
            dividend_basic_tax,
            dividend_higher_tax,
            dividend_additional_tax,
            total_dividend_tax,
            total: savings_interest_tax + total_dividend_tax,
        }
    }

    fn tax(&self, amount: Decimal, band: TaxBand, dividend: bool) -> Decimal {
        let rate = if dividend {
            self.rates.dividend_rate(band)
        } else {
            self.rates.income_rate(band)
        };
        pence(percent_of(amount, rate))
    }
}

impl BreakdownStep for InvestmentIncomeTax {
    fn step_key(&self) -> &'static str {
        "investment_income_tax"
    }

    fn inputs(&self) -> StepInputs {
        StepInputs::new()
            .amount("non_savings_taxable", self.non_savings_taxable)
            .amount("basic_room", self.basic_room)
            .amount("higher_room", self.higher_room)
            .amount("taxable_interest", self.savings.total())
            .amount("taxable_dividends", self.dividends.total())
            .amount("savings_interest_tax", self.savings_interest_tax)
            .amount("dividend_basic_tax", self.dividend_basic_tax)
            .amount("dividend_higher_tax", self.dividend_higher_tax)
            .amount("dividend_additional_tax", self.dividend_additional_tax)
    }

    fn result(&self) -> Decimal {
        self.total
    }

    fn explanation(&self) -> String {
        format!(
            "Investment Income Tax: savings {} + dividends {} = {}",
            format_gbp(self.savings_interest_tax),
            format_gbp(self.total_dividend_tax),
            format_gbp(self.total)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rates::TaxYear;
    use rust_decimal_macros::dec;

    fn rates() -> RateTable {
        RateTable::statutory(TaxYear(2025))
    }

    fn limits() -> BandLimits {
        BandLimits::new(&rates(), Decimal::ZERO)
    }

    #[test]
    fn room_after_non_savings() {
        let room = BandRoom::after_non_savings(&limits(), dec!(40000));
        assert_eq!(room.basic(), dec!(10270));
        assert_eq!(room.higher(), dec!(74870));

        let room = BandRoom::after_non_savings(&limits(), dec!(60000));
        assert_eq!(room.basic(), Decimal::ZERO);
        assert_eq!(room.higher(), dec!(65140));
    }

    #[test]
    fn allocation_spills_across_bands() {
        let mut room = BandRoom::after_non_savings(&limits(), dec!(50000));
        let slices = room.allocate(dec!(1000));
        assert_eq!(slices.basic, dec!(270));
        assert_eq!(slices.higher, dec!(730));
        assert_eq!(slices.additional, Decimal::ZERO);
        assert_eq!(room.basic(), Decimal::ZERO);
    }

    #[test]
    fn psa_sized_by_non_savings_band() {
        let r = rates();
        let calc = SavingsAllowanceCalculator::new(&r);

        let basic = calc.calculate(dec!(2000), dec!(30000), Decimal::ZERO);
        assert_eq!(basic.taxpayer_band, TaxBand::Basic);
        assert_eq!(basic.allowance, dec!(1000));
        assert_eq!(basic.taxable_interest, dec!(1000));

        let higher = calc.calculate(dec!(2000), dec!(60000), Decimal::ZERO);
        assert_eq!(higher.allowance, dec!(500));
        assert_eq!(higher.taxable_interest, dec!(1500));

        let additional = calc.calculate(dec!(2000), dec!(130000), Decimal::ZERO);
        assert_eq!(additional.allowance, Decimal::ZERO);
        assert_eq!(additional.taxable_interest, dec!(2000));
    }

    #[test]
    fn psa_uses_statutory_basic_limit() {
        let r = rates();
        // Just above the statutory basic limit: a higher-rate taxpayer whatever Gift Aid was paid
        let savings =
            SavingsAllowanceCalculator::new(&r).calculate(dec!(2000), dec!(50430), Decimal::ZERO);
        assert_eq!(savings.taxpayer_band, TaxBand::Higher);
        assert_eq!(savings.allowance, dec!(500));
        assert_eq!(savings.taxable_interest, dec!(1500));
    }

    #[test]
    fn psa_capped_at_interest() {
        let r = rates();
        let savings =
            SavingsAllowanceCalculator::new(&r).calculate(dec!(300), dec!(20000), Decimal::ZERO);
        assert_eq!(savings.allowance, dec!(300));
        assert_eq!(savings.taxable_interest, Decimal::ZERO);
    }

    #[test]
    fn unused_personal_allowance_covers_interest_first() {
        let r = rates();
        let calc = SavingsAllowanceCalculator::new(&r);

        let covered = calc.calculate(dec!(10000), Decimal::ZERO, dec!(12570));
        assert_eq!(covered.personal_allowance_used, dec!(10000));
        assert_eq!(covered.allowance, Decimal::ZERO);
        assert_eq!(covered.taxable_interest, Decimal::ZERO);

        // 2,570 of allowance left, then 1,000 PSA
        let partial = calc.calculate(dec!(5000), Decimal::ZERO, dec!(2570));
        assert_eq!(partial.personal_allowance_used, dec!(2570));
        assert_eq!(partial.allowance, dec!(1000));
        assert_eq!(partial.taxable_interest, dec!(1430));
    }

    #[test]
    fn no_interest_short_circuits() {
        let r = rates();
        let savings =
            SavingsAllowanceCalculator::new(&r).calculate(Decimal::ZERO, dec!(20000), dec!(100));
        assert_eq!(savings.personal_savings_allowance, Decimal::ZERO);
        assert_eq!(savings.personal_allowance_used, Decimal::ZERO);
        assert_eq!(savings.allowance, Decimal::ZERO);
        assert_eq!(savings.taxable_interest, Decimal::ZERO);
    }

    #[test]
    fn dividend_allowance() {
        let r = rates();
        let calc = DividendAllowanceCalculator::new(&r);
        let div = calc.calculate(dec!(3000), Decimal::ZERO);
        assert_eq!(div.allowance, dec!(500));
        assert_eq!(div.taxable_dividends, dec!(2500));

        assert_eq!(calc.calculate(dec!(200), Decimal::ZERO).taxable_dividends, Decimal::ZERO);
        assert_eq!(calc.calculate(dec!(-10), Decimal::ZERO).allowance, Decimal::ZERO);
    }

    #[test]
    fn unused_personal_allowance_covers_dividends() {
        let r = rates();
        let calc = DividendAllowanceCalculator::new(&r);

        let covered = calc.calculate(dec!(12000), dec!(12570));
        assert_eq!(covered.personal_allowance_used, dec!(12000));
        assert_eq!(covered.taxable_dividends, Decimal::ZERO);

        let partial = calc.calculate(dec!(4000), dec!(1000));
        assert_eq!(partial.personal_allowance_used, dec!(1000));
        assert_eq!(partial.allowance, dec!(500));
        assert_eq!(partial.taxable_dividends, dec!(2500));
    }

    #[test]
    fn savings_taxed_before_dividends() {
        let r = rates();
        // 1,000 of basic room left: interest fills it, dividends go to higher rate
        let tax = InvestmentIncomeTaxCalculator::new(&r).calculate(
            dec!(49270),
            dec!(1000),
            dec!(2000),
            &limits(),
        );
        assert_eq!(tax.basic_room, dec!(1000));
        assert_eq!(tax.savings.basic, dec!(1000));
        assert_eq!(tax.savings_interest_tax, dec!(200));
        assert_eq!(tax.dividends.basic, Decimal::ZERO);
        assert_eq!(tax.dividends.higher, dec!(2000));
        assert_eq!(tax.dividend_higher_tax, dec!(675));
        assert_eq!(tax.total, dec!(875));
    }

    #[test]
    fn dividends_in_basic_band() {
        let r = rates();
        let tax = InvestmentIncomeTaxCalculator::new(&r).calculate(
            dec!(20000),
            Decimal::ZERO,
            dec!(2500),
            &limits(),
        );
        assert_eq!(tax.savings_interest_tax, Decimal::ZERO);
        assert_eq!(tax.dividend_basic_tax, dec!(218.75));
        assert_eq!(tax.total_dividend_tax, dec!(218.75));
    }

    #[test]
    fn dividends_in_additional_band() {
        let r = rates();
        let tax = InvestmentIncomeTaxCalculator::new(&r).calculate(
            dec!(200000),
            Decimal::ZERO,
            dec!(1000),
            &limits(),
        );
        assert_eq!(tax.dividends.additional, dec!(1000));
        assert_eq!(tax.dividend_additional_tax, dec!(393.50));
    }

    #[test]
    fn gift_aid_extension_widens_room() {
        let r = rates();
        let widened = BandLimits::new(&r, dec!(1000));
        let tax = InvestmentIncomeTaxCalculator::new(&r).calculate(
            dec!(50270),
            dec!(1000),
            Decimal::ZERO,
            &widened,
        );
        assert_eq!(tax.savings.basic, dec!(1000));
        assert_eq!(tax.savings_interest_tax, dec!(200));
    }

    #[test]
    fn nothing_to_tax() {
        let r = rates();
        let tax = InvestmentIncomeTaxCalculator::new(&r).calculate(
            dec!(30000),
            Decimal::ZERO,
            Decimal::ZERO,
            &limits(),
        );
        assert_eq!(tax.total, Decimal::ZERO);
        assert_eq!(tax.step_key(), "investment_income_tax");
    }
}
