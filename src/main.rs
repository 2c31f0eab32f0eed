use clap::{Parser, Subcommand};

mod cmd;

use cmd::breakdown::BreakdownCommand;
use cmd::calculate::CalculateCommand;
use cmd::rates::RatesCommand;
use cmd::schema::SchemaCommand;

#[derive(Parser, Debug)]
#[command(name = "taxcalc", version, about = "Calculate UK income tax and National Insurance liability")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Calculate the liability for a tax return
    Calculate(CalculateCommand),
    /// Show the step-by-step calculation breakdown
    Breakdown(BreakdownCommand),
    /// Show the rate table for a tax year
    Rates(RatesCommand),
    /// Print the JSON Schema of an input document
    Schema(SchemaCommand),
}

fn main() {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let result = match &cli.command {
        Command::Calculate(cmd) => cmd.exec(),
        Command::Breakdown(cmd) => cmd.exec(),
        Command::Rates(cmd) => cmd.exec(),
        Command::Schema(cmd) => cmd.exec(),
    };

    if let Err(err) = result {
        eprintln!("calculation unavailable: {:#}", err);
        std::process::exit(1);
    }
}
