//! CLI command definitions
//!
//! Defines the clap commands for the harness CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run the booking API suite
    Api {
        /// Run against the in-process simulated booking API
        #[arg(long)]
        simulate: bool,
    },

    /// Run the storefront UI suite through a WebDriver server
    Ui,

    /// Run scenarios from YAML files
    Run {
        /// Scenario files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Run against the in-process simulated booking API
        #[arg(long)]
        simulate: bool,
    },

    /// Check that the booking API is up
    Ping {
        /// Ping the in-process simulated booking API
        #[arg(long)]
        simulate: bool,
    },
}
