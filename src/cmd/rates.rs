//! Rates command - show the rate table a calculation would use

use crate::cmd::load_rates;
use clap::Args;
use std::path::PathBuf;
use tabled::{settings::Style, Table, Tabled};
use taxcalc::core::TaxYear;

#[derive(Args, Debug)]
pub struct RatesCommand {
    /// Tax year (e.g., 2025 for 2024/25)
    #[arg(short, long, default_value_t = 2025)]
    year: i32,

    /// JSON file with rate tables to use instead of the statutory defaults
    #[arg(long)]
    rates: Option<PathBuf>,

    /// Output as JSON instead of formatted table
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Tabled)]
struct RateRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl RatesCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let store = load_rates(self.rates.as_deref())?;
        let year = TaxYear(self.year);
        let table = store.for_tax_year(year);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&table)?);
            return Ok(());
        }

        let value = serde_json::to_value(&table)?;
        let Some(fields) = value.as_object() else {
            anyhow::bail!("rate table did not serialise to an object");
        };
        let rows: Vec<RateRow> = fields
            .iter()
            .filter(|(name, _)| name.as_str() != "tax_year")
            .map(|(name, v)| RateRow {
                field: name.clone(),
                value: v.as_str().map_or_else(|| v.to_string(), str::to_string),
            })
            .collect();

        println!();
        println!("RATE TABLE ({})", year);
        println!();
        let table = Table::new(rows).with(Style::rounded()).to_string();
        println!("{}", table);
        Ok(())
    }
}
