//! Schema command - print expected input formats

use clap::Args;
use schemars::schema_for;
use taxcalc::core::{RateTable, TaxReturn};

#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// Which input document to describe
    #[arg(value_enum, default_value = "tax-return")]
    document: SchemaDocument,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SchemaDocument {
    /// A tax return with income sources and elections
    TaxReturn,
    /// A rate table for one tax year
    RateTable,
}

impl SchemaCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let schema = match self.document {
            SchemaDocument::TaxReturn => schema_for!(TaxReturn),
            SchemaDocument::RateTable => schema_for!(RateTable),
        };
        println!("{}", serde_json::to_string_pretty(&schema)?);
        Ok(())
    }
}
