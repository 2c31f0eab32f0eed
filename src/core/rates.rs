use super::error::CalculationError;
use chrono::NaiveDate;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Spouses born before this date qualify for Married Couple's Allowance
const MCA_BORN_BEFORE: NaiveDate = match NaiveDate::from_ymd_opt(1935, 4, 6) {
    Some(date) => date,
    None => panic!("invalid married couple's allowance cutoff"),
};

/// Tax band for income tax calculations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TaxBand {
    #[default]
    Basic,
    Higher,
    Additional,
}

impl TaxBand {
    pub fn display(&self) -> &'static str {
        match self {
            TaxBand::Basic => "basic rate",
            TaxBand::Higher => "higher rate",
            TaxBand::Additional => "additional rate",
        }
    }
}

/// UK Tax Year (runs 6 April to 5 April)
/// The year value represents the end year (e.g., 2025 = 2024/25 tax year)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub struct TaxYear(pub i32);

impl TaxYear {
    /// Display as "2024/25" format
    pub fn display(&self) -> String {
        format!("{}/{:02}", self.0 - 1, self.0 % 100)
    }
}

impl std::fmt::Display for TaxYear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// Per-year statutory constants. Percentages are stored as percent (20 = 20%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RateTable {
    pub tax_year: TaxYear,

    #[schemars(with = "f64")]
    pub personal_allowance: Decimal,
    #[schemars(with = "f64")]
    pub blind_persons_allowance: Decimal,
    /// Income above which the personal allowance is withdrawn
    #[schemars(with = "f64")]
    pub pa_withdrawal_threshold: Decimal,
    /// Allowance withdrawn per £1 of income above the threshold
    #[schemars(with = "f64")]
    pub pa_withdrawal_rate: Decimal,

    /// Upper limit of the basic rate band, applied to taxable income
    #[schemars(with = "f64")]
    pub basic_rate_limit: Decimal,
    /// Upper limit of the higher rate band, applied to taxable income
    #[schemars(with = "f64")]
    pub higher_rate_limit: Decimal,
    #[schemars(with = "f64")]
    pub basic_rate: Decimal,
    #[schemars(with = "f64")]
    pub higher_rate: Decimal,
    #[schemars(with = "f64")]
    pub additional_rate: Decimal,

    #[schemars(with = "f64")]
    pub dividend_basic_rate: Decimal,
    #[schemars(with = "f64")]
    pub dividend_higher_rate: Decimal,
    #[schemars(with = "f64")]
    pub dividend_additional_rate: Decimal,
    #[schemars(with = "f64")]
    pub dividend_allowance: Decimal,

    /// Personal Savings Allowance for a basic rate taxpayer
    #[schemars(with = "f64")]
    pub psa_basic: Decimal,
    /// Personal Savings Allowance for a higher rate taxpayer
    #[schemars(with = "f64")]
    pub psa_higher: Decimal,
    /// Personal Savings Allowance for an additional rate taxpayer
    #[schemars(with = "f64")]
    pub psa_additional: Decimal,

    /// Class 1 primary threshold
    #[schemars(with = "f64")]
    pub ni_lower_threshold: Decimal,
    /// Class 1 upper earnings limit
    #[schemars(with = "f64")]
    pub ni_upper_threshold: Decimal,
    #[schemars(with = "f64")]
    pub ni_basic_rate: Decimal,
    #[schemars(with = "f64")]
    pub ni_higher_rate: Decimal,

    #[schemars(with = "f64")]
    pub class_2_threshold: Decimal,
    /// Flat annual Class 2 contribution
    #[schemars(with = "f64")]
    pub class_2_flat_amount: Decimal,

    #[schemars(with = "f64")]
    pub class_4_lower_threshold: Decimal,
    #[schemars(with = "f64")]
    pub class_4_upper_threshold: Decimal,
    #[schemars(with = "f64")]
    pub class_4_basic_rate: Decimal,
    #[schemars(with = "f64")]
    pub class_4_higher_rate: Decimal,

    #[schemars(with = "f64")]
    pub trading_allowance: Decimal,
    /// Furnished property relief as a percentage of rental income
    #[schemars(with = "f64")]
    pub ftcr_relief_rate: Decimal,
    #[schemars(with = "f64")]
    pub pension_annual_allowance: Decimal,
    /// Rate at which relief-at-source contributions are grossed up
    #[schemars(with = "f64")]
    pub relief_at_source_rate: Decimal,

    #[schemars(with = "f64")]
    pub hicbc_threshold: Decimal,
    /// Income above the threshold that costs 1% of the benefit
    #[schemars(with = "f64")]
    pub hicbc_income_step: Decimal,

    #[schemars(with = "f64")]
    pub marriage_allowance_transfer: Decimal,
    #[schemars(with = "f64")]
    pub marriage_allowance_relief_rate: Decimal,

    #[schemars(with = "f64")]
    pub mca_maximum: Decimal,
    #[schemars(with = "f64")]
    pub mca_minimum: Decimal,
    #[schemars(with = "f64")]
    pub mca_income_limit: Decimal,
    #[schemars(with = "f64")]
    pub mca_relief_rate: Decimal,
    /// A spouse born before this date qualifies for Married Couple's Allowance
    pub mca_born_before: NaiveDate,
}

impl RateTable {
    /// 2024/25 statutory figures, labelled with the requested year.
    pub fn statutory(tax_year: TaxYear) -> Self {
        RateTable {
            tax_year,
            personal_allowance: dec!(12570),
            blind_persons_allowance: dec!(3070),
            pa_withdrawal_threshold: dec!(125140),
            pa_withdrawal_rate: dec!(0.5),
            basic_rate_limit: dec!(50270),
            higher_rate_limit: dec!(125140),
            basic_rate: dec!(20),
            higher_rate: dec!(40),
            additional_rate: dec!(45),
            dividend_basic_rate: dec!(8.75),
            dividend_higher_rate: dec!(33.75),
            dividend_additional_rate: dec!(39.35),
            dividend_allowance: dec!(500),
            psa_basic: dec!(1000),
            psa_higher: dec!(500),
            psa_additional: dec!(0),
            ni_lower_threshold: dec!(12570),
            ni_upper_threshold: dec!(50270),
            ni_basic_rate: dec!(8),
            ni_higher_rate: dec!(2),
            class_2_threshold: dec!(6725),
            class_2_flat_amount: dec!(163.80),
            class_4_lower_threshold: dec!(12570),
            class_4_upper_threshold: dec!(50270),
            class_4_basic_rate: dec!(8),
            class_4_higher_rate: dec!(2),
            trading_allowance: dec!(1000),
            ftcr_relief_rate: dec!(50),
            pension_annual_allowance: dec!(60000),
            relief_at_source_rate: dec!(20),
            hicbc_threshold: dec!(60000),
            hicbc_income_step: dec!(100),
            marriage_allowance_transfer: dec!(1260),
            marriage_allowance_relief_rate: dec!(20),
            mca_maximum: dec!(11080),
            mca_minimum: dec!(4280),
            mca_income_limit: dec!(37000),
            mca_relief_rate: dec!(10),
            mca_born_before: MCA_BORN_BEFORE,
        }
    }

    /// Standard income tax rate (percent) for a band
    pub fn income_rate(&self, band: TaxBand) -> Decimal {
        match band {
            TaxBand::Basic => self.basic_rate,
            TaxBand::Higher => self.higher_rate,
            TaxBand::Additional => self.additional_rate,
        }
    }

    /// Dividend tax rate (percent) for a band
    pub fn dividend_rate(&self, band: TaxBand) -> Decimal {
        match band {
            TaxBand::Basic => self.dividend_basic_rate,
            TaxBand::Higher => self.dividend_higher_rate,
            TaxBand::Additional => self.dividend_additional_rate,
        }
    }

    pub fn validate(&self) -> Result<(), CalculationError> {
        let invalid = |msg: String| Err(CalculationError::InvalidRateTable(msg));

        if self.basic_rate_limit <= Decimal::ZERO || self.basic_rate_limit >= self.higher_rate_limit {
            return invalid(format!(
                "{}: basic rate limit {} must be positive and below higher rate limit {}",
                self.tax_year, self.basic_rate_limit, self.higher_rate_limit
            ));
        }
        if self.ni_lower_threshold >= self.ni_upper_threshold {
            return invalid(format!(
                "{}: NI lower threshold {} must be below upper threshold {}",
                self.tax_year, self.ni_lower_threshold, self.ni_upper_threshold
            ));
        }
        if self.class_4_lower_threshold >= self.class_4_upper_threshold {
            return invalid(format!(
                "{}: Class 4 lower threshold {} must be below upper threshold {}",
                self.tax_year, self.class_4_lower_threshold, self.class_4_upper_threshold
            ));
        }
        if self.hicbc_income_step <= Decimal::ZERO {
            return invalid(format!("{}: HICBC income step must be positive", self.tax_year));
        }

        let percentages = [
            ("basic_rate", self.basic_rate),
            ("higher_rate", self.higher_rate),
            ("additional_rate", self.additional_rate),
            ("dividend_basic_rate", self.dividend_basic_rate),
            ("dividend_higher_rate", self.dividend_higher_rate),
            ("dividend_additional_rate", self.dividend_additional_rate),
            ("ni_basic_rate", self.ni_basic_rate),
            ("ni_higher_rate", self.ni_higher_rate),
            ("class_4_basic_rate", self.class_4_basic_rate),
            ("class_4_higher_rate", self.class_4_higher_rate),
            ("ftcr_relief_rate", self.ftcr_relief_rate),
            ("relief_at_source_rate", self.relief_at_source_rate),
            ("marriage_allowance_relief_rate", self.marriage_allowance_relief_rate),
            ("mca_relief_rate", self.mca_relief_rate),
        ];
        for (name, pct) in percentages {
            if pct < Decimal::ZERO || pct > dec!(100) {
                return invalid(format!("{}: {} {} outside [0, 100]", self.tax_year, name, pct));
            }
        }
        // Grossing up divides by (100 - rate)
        if self.relief_at_source_rate >= dec!(100) {
            return invalid(format!("{}: relief at source rate must be below 100", self.tax_year));
        }

        let amounts = [
            ("personal_allowance", self.personal_allowance),
            ("blind_persons_allowance", self.blind_persons_allowance),
            ("pa_withdrawal_threshold", self.pa_withdrawal_threshold),
            ("pa_withdrawal_rate", self.pa_withdrawal_rate),
            ("dividend_allowance", self.dividend_allowance),
            ("psa_basic", self.psa_basic),
            ("psa_higher", self.psa_higher),
            ("psa_additional", self.psa_additional),
            ("class_2_threshold", self.class_2_threshold),
            ("class_2_flat_amount", self.class_2_flat_amount),
            ("trading_allowance", self.trading_allowance),
            ("hicbc_threshold", self.hicbc_threshold),
            ("marriage_allowance_transfer", self.marriage_allowance_transfer),
            ("mca_minimum", self.mca_minimum),
            ("mca_income_limit", self.mca_income_limit),
        ];
        for (name, amount) in amounts {
            if amount < Decimal::ZERO {
                return invalid(format!("{}: {} must not be negative", self.tax_year, name));
            }
        }
        if self.mca_minimum > self.mca_maximum {
            return invalid(format!(
                "{}: MCA minimum {} exceeds maximum {}",
                self.tax_year, self.mca_minimum, self.mca_maximum
            ));
        }

        Ok(())
    }
}

/// Rate tables by tax year. Missing years are materialised from the statutory default on first
/// lookup, so a calculation never fails for want of configuration.
#[derive(Debug, Default)]
pub struct RateStore {
    tables: RwLock<HashMap<TaxYear, RateTable>>,
}

impl RateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from configured tables, validating each one.
    pub fn with_tables(tables: Vec<RateTable>) -> Result<Self, CalculationError> {
        let mut by_year = HashMap::new();
        for table in tables {
            table.validate()?;
            log::debug!("Loaded rate table for {}", table.tax_year);
            by_year.insert(table.tax_year, table);
        }
        Ok(RateStore {
            tables: RwLock::new(by_year),
        })
    }

    pub fn for_tax_year(&self, year: TaxYear) -> RateTable {
        if let Some(table) = self.tables.read().get(&year) {
            return table.clone();
        }

        let mut tables = self.tables.write();
        tables
            .entry(year)
            .or_insert_with(|| {
                if year != TaxYear(2025) {
                    log::warn!(
                        "No rate table configured for {}, using 2024/25 statutory figures",
                        year
                    );
                } else {
                    log::debug!("Materialising statutory rate table for {}", year);
                }
                RateTable::statutory(year)
            })
            .clone()
    }

}
