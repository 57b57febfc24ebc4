//! Step definitions and per-step outcomes

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use super::context::TestContext;
use crate::common::{Error, Result};
use crate::session::Session;
use crate::ui::UiDriver;

/// What a step's action gets to work with
pub struct StepEnv<'a> {
    pub context: &'a mut TestContext,
    pub session: &'a mut Session,
    ui: Option<&'a mut (dyn UiDriver + 'static)>,
}

impl<'a> StepEnv<'a> {
    pub fn new(
        context: &'a mut TestContext,
        session: &'a mut Session,
        ui: Option<&'a mut (dyn UiDriver + 'static)>,
    ) -> Self {
        Self {
            context,
            session,
            ui,
        }
    }

    /// The browser driver, for UI steps
    pub fn ui(&mut self) -> Result<&mut (dyn UiDriver + 'static)> {
        self.ui.as_deref_mut().ok_or(Error::UiDriverUnavailable)
    }
}

/// Executable body of a step
///
/// Return [`Error::Assertion`] for expected-vs-actual mismatches; any other
/// error is reported as a fault of the environment.
#[async_trait]
pub trait StepAction: Send + Sync {
    async fn run(&self, env: &mut StepEnv<'_>) -> Result<()>;
}

/// One unit of test behaviour with declared data dependencies
pub struct Step {
    id: String,
    requires: Vec<String>,
    produces: Vec<String>,
    expect_failure: bool,
    action: Box<dyn StepAction>,
}

impl Step {
    pub fn new(id: impl Into<String>, action: impl StepAction + 'static) -> Self {
        Self::from_boxed(id, Box::new(action))
    }

    pub fn from_boxed(id: impl Into<String>, action: Box<dyn StepAction>) -> Self {
        Self {
            id: id.into(),
            requires: Vec::new(),
            produces: Vec::new(),
            expect_failure: false,
            action,
        }
    }

    /// Context keys that must be written before this step runs
    pub fn requires<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Context keys this step writes when it passes
    pub fn produces<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.produces.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Record a failure of this step as expected instead of failed
    ///
    /// Dependents are still skipped when it fails.
    pub fn expected_to_fail(mut self) -> Self {
        self.expect_failure = true;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_expected_to_fail(&self) -> bool {
        self.expect_failure
    }

    pub fn required_keys(&self) -> &[String] {
        &self.requires
    }

    pub fn produced_keys(&self) -> &[String] {
        &self.produces
    }

    pub(crate) fn action(&self) -> &dyn StepAction {
        self.action.as_ref()
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("id", &self.id)
            .field("requires", &self.requires)
            .field("produces", &self.produces)
            .field("expect_failure", &self.expect_failure)
            .finish_non_exhaustive()
    }
}

/// Lifecycle of a step within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Passed,
    Failed,
    /// Failed, and marked as expected to
    ExpectedFailure,
    Skipped,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Passed => "passed",
            StepStatus::Failed => "failed",
            StepStatus::ExpectedFailure => "expected failure",
            StepStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Why a failed step failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The remote answered, but not as expected
    Assertion,
    /// The environment misbehaved (network, driver, broken invariant)
    Fault,
}

/// Terminal record of one step
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub id: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub duration_ms: u64,
}

impl StepOutcome {
    pub(crate) fn passed(id: &str, duration_ms: u64) -> Self {
        Self {
            id: id.to_string(),
            status: StepStatus::Passed,
            failure: None,
            reason: None,
            duration_ms,
        }
    }

    pub(crate) fn failed(id: &str, error: &Error, duration_ms: u64) -> Self {
        let failure = if error.is_assertion() {
            FailureKind::Assertion
        } else {
            FailureKind::Fault
        };
        Self {
            id: id.to_string(),
            status: StepStatus::Failed,
            failure: Some(failure),
            reason: Some(error.to_string()),
            duration_ms,
        }
    }

    pub(crate) fn expected_failure(id: &str, error: &Error, duration_ms: u64) -> Self {
        Self {
            status: StepStatus::ExpectedFailure,
            ..Self::failed(id, error, duration_ms)
        }
    }

    pub(crate) fn skipped(id: &str, reason: String) -> Self {
        Self {
            id: id.to_string(),
            status: StepStatus::Skipped,
            failure: None,
            reason: Some(reason),
            duration_ms: 0,
        }
    }
}
