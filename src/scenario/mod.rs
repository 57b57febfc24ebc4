//! Dependency-ordered test scenarios
//!
//! A [`Scenario`] is an ordered list of [`Step`]s, each declaring the
//! context keys it requires and produces. The [`ScenarioRunner`] derives the
//! execution order from those declarations and records a terminal
//! [`StepStatus`] for every step.

pub mod assert;
mod context;
mod graph;
mod runner;
mod step;

pub use context::TestContext;
pub use graph::{plan, Plan};
pub use runner::{RunSummary, ScenarioRunner};
pub use step::{FailureKind, Step, StepAction, StepEnv, StepOutcome, StepStatus};

/// Named collection of steps
#[derive(Debug)]
pub struct Scenario {
    name: String,
    steps: Vec<Step>,
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}
