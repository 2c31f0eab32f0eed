pub mod breakdown;
pub mod calculate;
pub mod rates;
pub mod schema;

use serde::Deserialize;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use taxcalc::core::{Orchestrator, RateStore, RateTable, TaxReturn};

/// A rates file holds one table or a list of tables
#[derive(Deserialize)]
#[serde(untagged)]
enum RatesFile {
    Many(Vec<RateTable>),
    One(RateTable),
}

/// Read a tax return (JSON) from a file, or stdin with "-"
pub fn read_return(path: &Path) -> anyhow::Result<TaxReturn> {
    let buffer = read_input(path)?;
    let tax_return: TaxReturn = serde_json::from_slice(&buffer)?;
    log::debug!(
        "Read return {} for {} with {} income sources",
        tax_return.id,
        tax_return.tax_year,
        tax_return.income_sources.len()
    );
    Ok(tax_return)
}

/// Rate store seeded from an optional rates file
pub fn load_rates(path: Option<&Path>) -> anyhow::Result<RateStore> {
    let Some(path) = path else {
        return Ok(RateStore::new());
    };
    let buffer = read_input(path)?;
    let file: RatesFile = serde_json::from_slice(&buffer)?;
    let tables = match file {
        RatesFile::Many(tables) => tables,
        RatesFile::One(table) => vec![table],
    };
    Ok(RateStore::with_tables(tables)?)
}

pub fn orchestrator(rates: Option<&Path>) -> anyhow::Result<Orchestrator> {
    Ok(Orchestrator::new(load_rates(rates)?))
}

fn read_input(path: &Path) -> anyhow::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    if path.as_os_str() == "-" {
        let stdin = io::stdin();
        BufReader::new(stdin.lock()).read_to_end(&mut buffer)?;
        if buffer.is_empty() {
            anyhow::bail!("No input received. Provide a file or pipe data to stdin.");
        }
    } else {
        let file = File::open(path)
            .map_err(|e| anyhow::anyhow!("cannot open {}: {}", path.display(), e))?;
        BufReader::new(file).read_to_end(&mut buffer)?;
    }
    Ok(buffer)
}
