//! Allowances and reliefs that adjust income or the personal allowance before banding.

use super::breakdown::{BreakdownStep, StepInputs};
use super::error::{ensure_amount, CalculationError};
use super::income::MarriageAllowanceRole;
use super::money::{format_gbp, pence, percent_of};
use super::rates::RateTable;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

// Gift Aid grosses up a net donation by 25/75.
const GIFT_AID_GROSS_UP_NUMERATOR: Decimal = dec!(25);
const GIFT_AID_GROSS_UP_DENOMINATOR: Decimal = dec!(75);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonalAllowance {
    pub income: Decimal,
    pub base_pa: Decimal,
    pub blind_allowance: Decimal,
    pub withdrawal_threshold: Decimal,
    pub withdrawal: Decimal,
    pub total_pa: Decimal,
}

pub struct PersonalAllowanceCalculator<'a> {
    rates: &'a RateTable,
}

impl<'a> PersonalAllowanceCalculator<'a> {
    pub fn new(rates: &'a RateTable) -> Self {
        Self { rates }
    }

    /// Personal allowance plus Blind Person's Allowance, withdrawn at 50p per £1 of income
    /// above the withdrawal threshold and never below zero.
    pub fn calculate(
        &self,
        income: Decimal,
        blind_person: bool,
    ) -> Result<PersonalAllowance, CalculationError> {
        let income = ensure_amount("income", income)?;
        let base_pa = self.rates.personal_allowance;
        let blind_allowance = if blind_person {
            self.rates.blind_persons_allowance
        } else {
            Decimal::ZERO
        };
        let threshold = self.rates.pa_withdrawal_threshold;

        let withdrawal = if income > threshold {
            (income - threshold) * self.rates.pa_withdrawal_rate
        } else {
            Decimal::ZERO
        };
        let total_pa = pence((base_pa + blind_allowance - withdrawal).max(Decimal::ZERO));

        log::debug!(
            "Personal allowance: base={}, blind={}, withdrawal={}, total={}",
            base_pa,
            blind_allowance,
            withdrawal,
            total_pa
        );

        Ok(PersonalAllowance {
            income,
            base_pa,
            blind_allowance,
            withdrawal_threshold: threshold,
            withdrawal: pence(withdrawal),
            total_pa,
        })
    }
}

impl BreakdownStep for PersonalAllowance {
    fn step_key(&self) -> &'static str {
        "personal_allowance"
    }

    fn inputs(&self) -> StepInputs {
        StepInputs::new()
            .amount("income", self.income)
            .amount("base_pa", self.base_pa)
            .amount("blind_allowance", self.blind_allowance)
            .amount("total_pa_before_withdrawal", self.base_pa + self.blind_allowance)
            .amount("withdrawal_threshold", self.withdrawal_threshold)
            .amount("withdrawal", self.withdrawal)
    }

    fn result(&self) -> Decimal {
        self.total_pa
    }

    fn explanation(&self) -> String {
        format!(
            "Personal Allowance: {} + Blind {} - withdrawal {} = {}",
            format_gbp(self.base_pa),
            format_gbp(self.blind_allowance),
            format_gbp(self.withdrawal),
            format_gbp(self.total_pa)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PensionRelief {
    pub net_contributions: Decimal,
    pub gross_contributions: Decimal,
    pub relief_at_source: Decimal,
    pub annual_allowance: Decimal,
    pub annual_allowance_exceeded: bool,
}

pub struct PensionReliefCalculator<'a> {
    rates: &'a RateTable,
}

impl<'a> PensionReliefCalculator<'a> {
    pub fn new(rates: &'a RateTable) -> Self {
        Self { rates }
    }

    /// Gross up relief-at-source contributions: `gross = net / 0.8`.
    /// The gross figure is deducted from taxable income.
    pub fn calculate(&self, net_contributions: Decimal) -> Result<PensionRelief, CalculationError> {
        let net = ensure_amount("pension_contributions", net_contributions)?;
        let retained = dec!(1) - self.rates.relief_at_source_rate / dec!(100);
        let gross = pence(net / retained);
        let annual_allowance = self.rates.pension_annual_allowance;

        if gross > annual_allowance {
            log::warn!(
                "Gross pension contributions {} exceed the annual allowance {}",
                gross,
                annual_allowance
            );
        }

        Ok(PensionRelief {
            net_contributions: net,
            gross_contributions: gross,
            relief_at_source: gross - net,
            annual_allowance,
            annual_allowance_exceeded: gross > annual_allowance,
        })
    }
}

impl BreakdownStep for PensionRelief {
    fn step_key(&self) -> &'static str {
        "pension_relief"
    }

    fn inputs(&self) -> StepInputs {
        StepInputs::new()
            .amount("net_contributions", self.net_contributions)
            .amount("gross_contributions", self.gross_contributions)
            .amount("annual_allowance", self.annual_allowance)
            .flag("allowance_exceeded", self.annual_allowance_exceeded)
    }

    fn result(&self) -> Decimal {
        self.relief_at_source
    }

    fn explanation(&self) -> String {
        format!(
            "Pension Relief: {} (contributions {} grossed to {})",
            format_gbp(self.relief_at_source),
            format_gbp(self.net_contributions),
            format_gbp(self.gross_contributions)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GiftAid {
    pub donations_net: Decimal,
    pub gross_up: Decimal,
    pub total_gross_donation: Decimal,
    /// Widens the basic rate band; never deducted from income
    pub band_extension: Decimal,
    pub basic_rate_relief: Decimal,
}

pub struct GiftAidCalculator<'a> {
    rates: &'a RateTable,
}

impl<'a> GiftAidCalculator<'a> {
    pub fn new(rates: &'a RateTable) -> Self {
        Self { rates }
    }

    pub fn calculate(&self, donations_net: Decimal) -> Result<GiftAid, CalculationError> {
        let net = ensure_amount("gift_aid_donations", donations_net)?;
        let gross_up = pence(net * GIFT_AID_GROSS_UP_NUMERATOR / GIFT_AID_GROSS_UP_DENOMINATOR);
        let total = net + gross_up;

        Ok(GiftAid {
            donations_net: net,
            gross_up,
            total_gross_donation: total,
            band_extension: total,
            basic_rate_relief: pence(percent_of(net, self.rates.relief_at_source_rate)),
        })
    }
}

impl BreakdownStep for GiftAid {
    fn step_key(&self) -> &'static str {
        "gift_aid"
    }

    fn inputs(&self) -> StepInputs {
        StepInputs::new()
            .amount("donations_net", self.donations_net)
            .amount("gross_up", self.gross_up)
            .amount("total_gross_donation", self.total_gross_donation)
            .amount("basic_rate_relief", self.basic_rate_relief)
    }

    fn result(&self) -> Decimal {
        self.total_gross_donation
    }

    fn explanation(&self) -> String {
        format!(
            "Gift Aid: {} grossed to {}, basic rate band extended by {}",
            format_gbp(self.donations_net),
            format_gbp(self.total_gross_donation),
            format_gbp(self.band_extension)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarriageAllowance {
    pub role: Option<MarriageAllowanceRole>,
    pub transfer_amount: Decimal,
    /// Credit against income tax, only for the transferee
    pub tax_reduction: Decimal,
    /// Change to the claimant's own personal allowance
    pub pa_adjustment: Decimal,
}

pub struct MarriageAllowanceCalculator<'a> {
    rates: &'a RateTable,
}

impl<'a> MarriageAllowanceCalculator<'a> {
    pub fn new(rates: &'a RateTable) -> Self {
        Self { rates }
    }

    pub fn calculate(&self, role: Option<MarriageAllowanceRole>) -> MarriageAllowance {
        let Some(role) = role else {
            return MarriageAllowance {
                role: None,
                transfer_amount: Decimal::ZERO,
                tax_reduction: Decimal::ZERO,
                pa_adjustment: Decimal::ZERO,
            };
        };

        let transfer = self.rates.marriage_allowance_transfer;
        let (tax_reduction, pa_adjustment) = match role {
            MarriageAllowanceRole::Transferor => (Decimal::ZERO, -transfer),
            MarriageAllowanceRole::Transferee => (
                pence(percent_of(transfer, self.rates.marriage_allowance_relief_rate)),
                Decimal::ZERO,
            ),
        };

        MarriageAllowance {
            role: Some(role),
            transfer_amount: transfer,
            tax_reduction,
            pa_adjustment,
        }
    }
}

impl BreakdownStep for MarriageAllowance {
    fn step_key(&self) -> &'static str {
        "marriage_allowance"
    }

    fn inputs(&self) -> StepInputs {
        let role = match self.role {
            Some(MarriageAllowanceRole::Transferor) => "transferor",
            Some(MarriageAllowanceRole::Transferee) => "transferee",
            None => "not claimed",
        };
        StepInputs::new()
            .text("role", role)
            .amount("transfer_amount", self.transfer_amount)
            .amount("pa_adjustment", self.pa_adjustment)
    }

    fn result(&self) -> Decimal {
        self.tax_reduction
    }

    fn explanation(&self) -> String {
        match self.role {
            None => "Marriage Allowance: not claimed".to_string(),
            Some(MarriageAllowanceRole::Transferor) => format!(
                "Marriage Allowance: Transferor - {} PA transferred out",
                format_gbp(self.transfer_amount)
            ),
            Some(MarriageAllowanceRole::Transferee) => format!(
                "Marriage Allowance: Transferee - {} PA received, tax reduction {}",
                format_gbp(self.transfer_amount),
                format_gbp(self.tax_reduction)
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarriedCouplesAllowance {
    pub claimed: bool,
    pub spouse_dob: Option<NaiveDate>,
    pub eligible: bool,
    pub net_income: Decimal,
    pub allowance: Decimal,
    /// Tax reduction: allowance × 10%
    pub relief: Decimal,
}

pub struct MarriedCouplesAllowanceCalculator<'a> {
    rates: &'a RateTable,
}

impl<'a> MarriedCouplesAllowanceCalculator<'a> {
    pub fn new(rates: &'a RateTable) -> Self {
        Self { rates }
    }

    pub fn calculate(
        &self,
        claimed: bool,
        spouse_dob: Option<NaiveDate>,
        net_income: Decimal,
    ) -> Result<MarriedCouplesAllowance, CalculationError> {
        let net_income = ensure_amount("net_income", net_income)?;
        if claimed && spouse_dob.is_none() {
            return Err(CalculationError::MissingSpouseDob);
        }
        let eligible = claimed && spouse_dob.is_some_and(|dob| dob < self.rates.mca_born_before);

        let (allowance, relief) = if eligible {
            let allowance = self.tapered_allowance(net_income);
            (allowance, pence(percent_of(allowance, self.rates.mca_relief_rate)))
        } else {
            (Decimal::ZERO, Decimal::ZERO)
        };

        Ok(MarriedCouplesAllowance {
            claimed,
            spouse_dob,
            eligible,
            net_income,
            allowance,
            relief,
        })
    }

    /// Reduced by £1 for every £2 of income over the limit, down to the minimum
    fn tapered_allowance(&self, net_income: Decimal) -> Decimal {
        let maximum = self.rates.mca_maximum;
        if net_income <= self.rates.mca_income_limit {
            return maximum;
        }
        let reduction = ((net_income - self.rates.mca_income_limit) / dec!(2)).floor();
        (maximum - reduction).max(self.rates.mca_minimum)
    }
}

impl BreakdownStep for MarriedCouplesAllowance {
    fn step_key(&self) -> &'static str {
        "married_couples_allowance"
    }

    fn inputs(&self) -> StepInputs {
        StepInputs::new()
            .flag("claimed", self.claimed)
            .flag("eligible", self.eligible)
            .date("spouse_dob", self.spouse_dob)
            .amount("net_income", self.net_income)
            .amount("allowance", self.allowance)
    }

    fn result(&self) -> Decimal {
        self.relief
    }

    fn explanation(&self) -> String {
        if !self.eligible {
            return "Married Couple's Allowance: not claimed or not eligible".to_string();
        }
        format!(
            "Married Couple's Allowance: {} × 10% = {} tax reduction",
            format_gbp(self.allowance),
            format_gbp(self.relief)
        )
    }
}
