//! Breakdown command - the ordered calculation steps behind a liability

use crate::cmd::{orchestrator, read_return};
use clap::Args;
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};
use taxcalc::core::{format_gbp, CalculationStep, StepInputs};

#[derive(Args, Debug)]
pub struct BreakdownCommand {
    /// Tax return JSON file. Reads from stdin if not specified.
    #[arg(short = 'r', long = "return", default_value = "-")]
    file: PathBuf,

    /// JSON file with rate tables to use instead of the statutory defaults
    #[arg(long)]
    rates: Option<PathBuf>,

    /// Output as CSV
    #[arg(long, conflicts_with = "json")]
    csv: bool,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

impl BreakdownCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let tax_return = read_return(&self.file)?;
        let orchestrator = orchestrator(self.rates.as_deref())?;
        orchestrator.calculate(&tax_return)?;
        let steps = orchestrator.breakdown(&tax_return.id);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&steps)?);
        } else if self.csv {
            write_csv(&steps, io::stdout())?;
        } else {
            print_table(&steps);
        }
        Ok(())
    }
}

fn print_table(steps: &[CalculationStep]) {
    let rows: Vec<StepRow> = steps
        .iter()
        .map(|s| StepRow {
            sequence: s.sequence,
            step: s.step_key.clone(),
            result: format_gbp(s.result),
            explanation: s.explanation.clone(),
        })
        .collect();

    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::one(2)).with(Alignment::right()))
        .to_string();
    println!("{}", table);
}

pub fn write_csv<W: io::Write>(steps: &[CalculationStep], writer: W) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for step in steps {
        wtr.serialize(StepRecord::from(step))?;
    }
    wtr.flush()?;
    Ok(())
}

#[derive(Debug, Clone, Tabled)]
struct StepRow {
    #[tabled(rename = "#")]
    sequence: u32,
    #[tabled(rename = "Step")]
    step: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Explanation")]
    explanation: String,
}

#[derive(Serialize)]
struct StepRecord {
    tax_return_id: String,
    run: u32,
    sequence: u32,
    step_key: String,
    result: String,
    inputs: String,
    explanation: String,
}

impl From<&CalculationStep> for StepRecord {
    fn from(step: &CalculationStep) -> Self {
        StepRecord {
            tax_return_id: step.tax_return_id.to_string(),
            run: step.run,
            sequence: step.sequence,
            step_key: step.step_key.clone(),
            result: step.result.to_string(),
            inputs: flatten_inputs(&step.inputs),
            explanation: step.explanation.clone(),
        }
    }
}

fn flatten_inputs(inputs: &StepInputs) -> String {
    inputs
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("; ")
}
