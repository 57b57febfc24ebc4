//! Scenario harness CLI
//!
//! Runs the booking API suite, the storefront UI suite and YAML scenario
//! files, printing a per-step summary.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use harness::common::{logging, Config};
use harness::{cli, commands::Commands};

#[derive(Parser)]
#[command(name = "harness", about = "Dependency-ordered API and UI test scenarios")]
#[command(version, long_about = None)]
struct Cli {
    /// Configuration file (default: platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print run summaries as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_cli(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };

    let result = match config {
        Ok(config) => cli::dispatch(cli.command, &config, cli::Output { json: cli.json }).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(cli::exit_code(&e))
        }
    }
}
