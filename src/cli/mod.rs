//! CLI command handling
//!
//! Builds the session and runner a command needs, runs the scenarios and
//! prints their summaries.

use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use tracing::info;

use crate::booking::{self, SimulatedBookingApi};
use crate::commands::Commands;
use crate::common::{Config, Error, Result};
use crate::scenario::{self, RunSummary, Scenario, ScenarioRunner};
use crate::session::Session;
use crate::testing;
use crate::ui::{self, WebDriverClient};

/// Output options shared by all commands
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    /// Print summaries as JSON instead of coloured text
    pub json: bool,
}

/// Dispatch a CLI command
///
/// Returns whether every step of every scenario passed.
pub async fn dispatch(command: Commands, config: &Config, output: Output) -> Result<bool> {
    match command {
        Commands::Api { simulate } => {
            let mut runner = runner(session(config, simulate)?, config);
            let summary = runner.run(&booking::suite::scenario(&config.api)).await?;
            report(&[summary], output)
        }

        Commands::Ui => {
            let driver = WebDriverClient::connect(&config.ui).await?;
            let mut runner = runner(session(config, false)?, config).with_ui(Box::new(driver));
            let result = runner.run(&ui::suite::scenario(&config.ui)).await;
            runner.finish().await?;
            report(&[result?], output)
        }

        Commands::Run { files, simulate } => {
            // Build and plan everything first so a broken file runs nothing
            let scenarios = files
                .iter()
                .map(|path| testing::scenario_from_path(path, &config.api))
                .collect::<Result<Vec<Scenario>>>()?;
            for scenario in &scenarios {
                scenario::plan(scenario.steps())?;
            }

            let mut runner = runner(session(config, simulate)?, config);
            let mut summaries = Vec::with_capacity(scenarios.len());
            for scenario in &scenarios {
                summaries.push(runner.run(scenario).await?);
            }
            report(&summaries, output)
        }

        Commands::Ping { simulate } => {
            let session = session(config, simulate)?;
            let status = booking::ping(&session).await?;
            let up = status == booking::PING_STATUS;
            if output.json {
                println!(
                    "{}",
                    serde_json::json!({ "url": session.base_url(), "status": status, "up": up })
                );
            } else if up {
                println!("{} {} answered {}", "✓".green(), session.base_url(), status);
            } else {
                println!(
                    "{} {} answered {}, expected {}",
                    "✗".red(),
                    session.base_url(),
                    status,
                    booking::PING_STATUS
                );
            }
            Ok(up)
        }
    }
}

/// Session against the configured API, or against a fresh simulation that
/// accepts the configured credentials
fn session(config: &Config, simulate: bool) -> Result<Session> {
    if simulate {
        info!("Using the simulated booking API");
        let api = SimulatedBookingApi::with_credentials(
            config.api.username.clone(),
            config.api.password.clone(),
        );
        Ok(Session::new(Arc::new(api)).configured(config))
    } else {
        Session::from_config(config)
    }
}

fn runner(session: Session, config: &Config) -> ScenarioRunner {
    ScenarioRunner::new(session)
        .with_step_timeout(config.runner.step_timeout_secs.map(Duration::from_secs))
}

fn report(summaries: &[RunSummary], output: Output) -> Result<bool> {
    if output.json {
        testing::print_summary_json(summaries)?;
    } else {
        summaries.iter().for_each(testing::print_summary);
    }
    Ok(summaries.iter().all(RunSummary::success))
}

/// Process exit code for an error that ended a command
///
/// Configuration and dependency problems mean nothing ran at all.
pub fn exit_code(error: &Error) -> u8 {
    match error {
        Error::Config(_)
        | Error::ConfigParse(_)
        | Error::FileRead { .. }
        | Error::Yaml(_)
        | Error::Dependency(_) => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::FaultKind;

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&Error::Dependency("cycle".into())), 2);
        assert_eq!(exit_code(&Error::Config("bad".into())), 2);
        assert_eq!(exit_code(&Error::transport(FaultKind::Timeout, "GET /ping")), 1);
    }

    #[tokio::test]
    async fn test_simulated_api_suite_succeeds() {
        let ok = dispatch(
            Commands::Api { simulate: true },
            &Config::default(),
            Output { json: true },
        )
        .await
        .unwrap();
        assert!(ok);
    }

    #[tokio::test]
    async fn test_simulated_ping_is_up() {
        let ok = dispatch(
            Commands::Ping { simulate: true },
            &Config::default(),
            Output::default(),
        )
        .await
        .unwrap();
        assert!(ok);
    }
}
