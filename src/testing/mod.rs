//! Declarative scenario files and run reports
//!
//! Scenario files describe HTTP steps in YAML: the request, the checks on
//! its answer and the values captured into the context. They run through
//! the same [`ScenarioRunner`](crate::scenario::ScenarioRunner) as the
//! built-in suites.

mod config;
mod report;
mod runner;

pub use config::*;
pub use report::{print_summary, print_summary_json};
pub use runner::{build_scenario, load_scenario, scenario_from_path};
