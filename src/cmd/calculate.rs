//! Calculate command - run the full liability calculation for one return

use crate::cmd::{orchestrator, read_return};
use clap::Args;
use rust_decimal::Decimal;
use std::path::PathBuf;
use taxcalc::core::{format_gbp, Liability};

#[derive(Args, Debug)]
pub struct CalculateCommand {
    /// Tax return JSON file. Reads from stdin if not specified.
    #[arg(short = 'r', long = "return", default_value = "-")]
    file: PathBuf,

    /// JSON file with rate tables to use instead of the statutory defaults
    #[arg(long)]
    rates: Option<PathBuf>,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

impl CalculateCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let tax_return = read_return(&self.file)?;
        let orchestrator = orchestrator(self.rates.as_deref())?;
        let liability = orchestrator.calculate(&tax_return)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&liability.summary())?);
        } else {
            print_summary(&liability);
        }
        Ok(())
    }
}

fn print_summary(l: &Liability) {
    let f = &l.figures;

    println!();
    println!("TAX LIABILITY {} ({})", l.tax_return_id, l.tax_year);
    println!();

    println!("INCOME");
    line("Gross income", f.gross_income);
    line("Net income", f.net_income);
    line("Adjusted net income", f.adjusted_net_income);
    println!();

    println!("ALLOWANCES & RELIEFS");
    line("Personal allowance", f.personal_allowance);
    optional("Trading allowance", f.trading_allowance);
    optional("Furnished property relief", f.furnished_property_relief);
    optional("Pension contributions (gross)", f.pension_contributions_gross);
    optional("Gift Aid band extension", f.gift_aid_band_extension);
    line("Taxable income", f.taxable_income);
    println!();

    println!("INCOME TAX");
    line("Basic rate", f.basic_rate_tax);
    optional("Higher rate", f.higher_rate_tax);
    optional("Additional rate", f.additional_rate_tax);
    optional("Savings interest", f.savings_interest_tax);
    optional("Dividends", f.total_dividend_tax);
    optional("Tax reductions", -l.tax_reductions);
    println!();

    println!("NATIONAL INSURANCE");
    line("Class 1", f.class_1_ni);
    optional("Class 2", f.class_2_ni);
    optional("Class 4", f.class_4_ni);
    println!();

    optional("High Income Child Benefit Charge", f.hicbc_charge);
    line("Total tax and NI", l.total_tax_and_ni);
    line("Paid at source", f.tax_paid_at_source);
    line("Net liability", l.net_liability);
    println!();

    if l.owes_tax() {
        println!("Owed: {}", format_gbp(l.net_liability));
    } else if l.refund_due() {
        println!("Refund due: {}", format_gbp(-l.net_liability));
    } else {
        println!("Balanced");
    }
}

fn line(label: &str, amount: Decimal) {
    println!("  {:<34} {:>14}", label, format_gbp(amount));
}

fn optional(label: &str, amount: Decimal) {
    if !amount.is_zero() {
        line(label, amount);
    }
}
