use super::breakdown::{BreakdownStep, StepInputs};
use super::error::{add_amount, ensure_amount, CalculationError};
use super::money::{format_gbp, pence};
use super::rates::TaxYear;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Category of a declared income source or outgoing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum IncomeCategory {
    Employment,
    SelfEmployment,
    Dividends,
    Interest,
    Pension,
    Rental,
    /// Net Gift Aid donation paid by the taxpayer
    GiftAidDonation,
    /// Net relief-at-source pension contribution paid by the taxpayer
    PensionContribution,
    Other,
}

impl IncomeCategory {
    /// Whether the category counts towards gross income (outgoings do not)
    pub fn is_income(self) -> bool {
        !matches!(
            self,
            IncomeCategory::GiftAidDonation | IncomeCategory::PensionContribution
        )
    }
}

/// A declared income source, already converted to GBP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IncomeSource {
    pub category: IncomeCategory,
    #[schemars(with = "f64")]
    pub amount_gross: Decimal,
    /// Tax withheld at source (PAYE), meaningful for employment
    #[serde(default)]
    #[schemars(with = "f64")]
    pub amount_tax_taken: Decimal,
    #[serde(default)]
    pub description: Option<String>,
}

/// Which side of a Marriage Allowance transfer the taxpayer is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MarriageAllowanceRole {
    /// Gives 10% of their personal allowance to their spouse
    Transferor,
    /// Receives the transferred allowance
    Transferee,
}

/// Claims and status flags declared on the return
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Elections {
    pub blind_person: bool,
    pub uses_trading_allowance: bool,
    pub marriage_allowance: Option<MarriageAllowanceRole>,
    pub claims_married_couples_allowance: bool,
    pub spouse_dob: Option<NaiveDate>,
    /// Child Benefit received in the year, for the High Income Child Benefit Charge
    #[schemars(with = "f64")]
    pub child_benefit_received: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ReturnId(pub String);

impl std::fmt::Display for ReturnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A tax return as handed over by the records collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TaxReturn {
    pub id: ReturnId,
    pub tax_year: TaxYear,
    #[serde(default)]
    pub elections: Elections,
    #[serde(default)]
    pub income_sources: Vec<IncomeSource>,
}

/// Declared amounts summed by category
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregatedIncome {
    pub employment: Decimal,
    pub self_employment: Decimal,
    pub dividends: Decimal,
    pub interest: Decimal,
    pub pension: Decimal,
    pub rental: Decimal,
    pub other: Decimal,
    /// Net contributions as paid (grossed up by the pension relief calculator)
    pub pension_contributions: Decimal,
    /// Net donations as paid (grossed up by the Gift Aid calculator)
    pub gift_aid_donations: Decimal,
    pub tax_paid_at_source: Decimal,
    /// Sum of every income category
    pub gross_total: Decimal,
}

pub struct IncomeAggregator;

impl IncomeAggregator {
    /// Sum gross amounts by category. Missing categories are zero; negative amounts and totals beyond
    /// the supported range are an error.
    pub fn aggregate(sources: &[IncomeSource]) -> Result<AggregatedIncome, CalculationError> {
        let mut agg = AggregatedIncome::default();

        for source in sources {
            let amount = ensure_amount("amount_gross", source.amount_gross)?;
            let withheld = ensure_amount("amount_tax_taken", source.amount_tax_taken)?;

            let slot = match source.category {
                IncomeCategory::Employment => &mut agg.employment,
                IncomeCategory::SelfEmployment => &mut agg.self_employment,
                IncomeCategory::Dividends => &mut agg.dividends,
                IncomeCategory::Interest => &mut agg.interest,
                IncomeCategory::Pension => &mut agg.pension,
                IncomeCategory::Rental => &mut agg.rental,
                IncomeCategory::Other => &mut agg.other,
                IncomeCategory::PensionContribution => &mut agg.pension_contributions,
                IncomeCategory::GiftAidDonation => &mut agg.gift_aid_donations,
            };
            *slot = add_amount("amount_gross", *slot, amount)?;
            agg.tax_paid_at_source =
                add_amount("amount_tax_taken", agg.tax_paid_at_source, withheld)?;

            if source.category.is_income() {
                agg.gross_total = add_amount("gross_total", agg.gross_total, amount)?;
            }
        }

        log::debug!(
            "Aggregated {} sources: gross={}, paid at source={}",
            sources.len(),
            agg.gross_total,
            agg.tax_paid_at_source
        );
        Ok(agg)
    }
}

impl BreakdownStep for AggregatedIncome {
    fn step_key(&self) -> &'static str {
        "income_aggregation"
    }

    fn inputs(&self) -> StepInputs {
        StepInputs::new()
            .amount("employment", self.employment)
            .amount("self_employment", self.self_employment)
            .amount("pension", self.pension)
            .amount("rental", self.rental)
            .amount("dividends", self.dividends)
            .amount("interest", self.interest)
            .amount("other", self.other)
            .amount("pension_contributions", self.pension_contributions)
            .amount("gift_aid_donations", self.gift_aid_donations)
            .amount("tax_paid_at_source", self.tax_paid_at_source)
    }

    fn result(&self) -> Decimal {
        pence(self.gross_total)
    }

    fn explanation(&self) -> String {
        format!(
            "Aggregated income: employment {} + self-employment {} + pension {} + rental {} + dividends {} + interest {} + other {} = {}",
            format_gbp(self.employment),
            format_gbp(self.self_employment),
            format_gbp(self.pension),
            format_gbp(self.rental),
            format_gbp(self.dividends),
            format_gbp(self.interest),
            format_gbp(self.other),
            format_gbp(self.gross_total)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::breakdown::InputValue;
    use crate::core::error::MAX_AMOUNT;
    use rust_decimal_macros::dec;

    fn source(category: IncomeCategory, gross: Decimal, taken: Decimal) -> IncomeSource {
        IncomeSource {
            category,
            amount_gross: gross,
            amount_tax_taken: taken,
            description: None,
        }
    }

    #[test]
    fn sums_by_category() {
        let sources = vec![
            source(IncomeCategory::Employment, dec!(30000), dec!(4000)),
            source(IncomeCategory::Employment, dec!(20000), dec!(2000)),
            source(IncomeCategory::Dividends, dec!(1200), dec!(0)),
            source(IncomeCategory::Interest, dec!(300), dec!(0)),
        ];

        let agg = IncomeAggregator::aggregate(&sources).unwrap();
        assert_eq!(agg.employment, dec!(50000));
        assert_eq!(agg.dividends, dec!(1200));
        assert_eq!(agg.interest, dec!(300));
        assert_eq!(agg.gross_total, dec!(51500));
        assert_eq!(agg.tax_paid_at_source, dec!(6000));
    }

    #[test]
    fn missing_categories_are_zero() {
        let agg = IncomeAggregator::aggregate(&[]).unwrap();
        assert_eq!(agg, AggregatedIncome::default());
        assert_eq!(agg.gross_total, Decimal::ZERO);
    }

    #[test]
    fn outgoings_excluded_from_gross_total() {
        let sources = vec![
            source(IncomeCategory::Employment, dec!(40000), dec!(0)),
            source(IncomeCategory::PensionContribution, dec!(800), dec!(0)),
            source(IncomeCategory::GiftAidDonation, dec!(750), dec!(0)),
        ];

        let agg = IncomeAggregator::aggregate(&sources).unwrap();
        assert_eq!(agg.gross_total, dec!(40000));
        assert_eq!(agg.pension_contributions, dec!(800));
        assert_eq!(agg.gift_aid_donations, dec!(750));
    }

    #[test]
    fn negative_amount_fails_fast() {
        let sources = vec![source(IncomeCategory::Rental, dec!(-10), dec!(0))];
        assert!(matches!(
            IncomeAggregator::aggregate(&sources),
            Err(CalculationError::NegativeAmount { .. })
        ));
    }

    #[test]
    fn negative_tax_taken_fails_fast() {
        let sources = vec![source(IncomeCategory::Employment, dec!(10), dec!(-1))];
        assert!(IncomeAggregator::aggregate(&sources).is_err());
    }

    #[test]
    fn oversized_amounts_fail_instead_of_overflowing() {
        let sources = vec![
            source(IncomeCategory::Employment, Decimal::MAX, dec!(0)),
            source(IncomeCategory::Employment, dec!(1), dec!(0)),
        ];
        assert_eq!(
            IncomeAggregator::aggregate(&sources),
            Err(CalculationError::Overflow { field: "amount_gross" })
        );

        let sources = vec![
            source(IncomeCategory::Employment, MAX_AMOUNT, dec!(0)),
            source(IncomeCategory::Rental, MAX_AMOUNT, dec!(0)),
        ];
        assert_eq!(
            IncomeAggregator::aggregate(&sources),
            Err(CalculationError::Overflow { field: "gross_total" })
        );
    }

    #[test]
    fn step_summarises_subtotals() {
        let sources = vec![source(IncomeCategory::SelfEmployment, dec!(8000), dec!(0))];
        let agg = IncomeAggregator::aggregate(&sources).unwrap();
        assert_eq!(agg.step_key(), "income_aggregation");
        assert_eq!(agg.result(), dec!(8000));
        assert_eq!(
            agg.inputs().get("self_employment"),
            Some(&InputValue::Amount(dec!(8000)))
        );
    }

    #[test]
    fn return_deserialises_with_defaults() {
        let json = r#"{
            "id": "r-1",
            "tax_year": 2025,
            "income_sources": [
                { "category": "employment", "amount_gross": 50000, "amount_tax_taken": 7500 },
                { "category": "gift_aid_donation", "amount_gross": "750" }
            ]
        }"#;
        let ret: TaxReturn = serde_json::from_str(json).unwrap();
        assert_eq!(ret.id, ReturnId("r-1".to_string()));
        assert_eq!(ret.tax_year, TaxYear(2025));
        assert_eq!(ret.elections, Elections::default());
        assert_eq!(ret.income_sources[1].amount_tax_taken, Decimal::ZERO);
        assert_eq!(ret.income_sources[1].amount_gross, dec!(750));
    }

    #[test]
    fn unknown_category_rejected() {
        let json = r#"{ "id": "r", "tax_year": 2025,
            "income_sources": [{ "category": "lottery", "amount_gross": 1 }] }"#;
        assert!(serde_json::from_str::<TaxReturn>(json).is_err());
    }
}
