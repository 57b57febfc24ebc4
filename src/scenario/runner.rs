//! Scenario runner
//!
//! Executes steps one at a time in dependency order. A failing step never
//! aborts the run; steps whose inputs it would have produced are skipped
//! with the upstream step named as the reason.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::context::TestContext;
use super::graph::{self, Plan};
use super::step::{Step, StepEnv, StepOutcome, StepStatus};
use super::Scenario;
use crate::common::{Error, Result};
use crate::session::Session;
use crate::ui::UiDriver;

/// Result of one scenario run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub scenario: String,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Failures of steps marked as expected to fail
    pub expected_failures: usize,
    /// Outcomes in execution order
    pub outcomes: Vec<StepOutcome>,
}

impl RunSummary {
    fn new(scenario: &str, outcomes: Vec<StepOutcome>) -> Self {
        let count = |status| outcomes.iter().filter(|o| o.status == status).count();
        Self {
            scenario: scenario.to_string(),
            passed: count(StepStatus::Passed),
            failed: count(StepStatus::Failed),
            skipped: count(StepStatus::Skipped),
            expected_failures: count(StepStatus::ExpectedFailure),
            outcomes,
        }
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// True when no step failed or was skipped; expected failures do not count
    pub fn success(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }

    pub fn outcome(&self, id: &str) -> Option<&StepOutcome> {
        self.outcomes.iter().find(|o| o.id == id)
    }

    /// Steps that did not pass, with their reasons
    pub fn problems(&self) -> impl Iterator<Item = &StepOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status != StepStatus::Passed)
    }
}

/// Owns the session, context and optional browser of a run
pub struct ScenarioRunner {
    session: Session,
    context: TestContext,
    ui: Option<Box<dyn UiDriver>>,
    step_timeout: Option<Duration>,
}

impl ScenarioRunner {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            context: TestContext::new(),
            ui: None,
            step_timeout: None,
        }
    }

    /// Make a browser driver available to UI steps
    pub fn with_ui(mut self, driver: Box<dyn UiDriver>) -> Self {
        self.ui = Some(driver);
        self
    }

    /// Bound every step action, retries included
    pub fn with_step_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.step_timeout = timeout;
        self
    }

    /// Context as left by the last run
    pub fn context(&self) -> &TestContext {
        &self.context
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run a scenario from a fresh context and an unauthenticated session
    ///
    /// Returns [`Error::Dependency`] without running anything when the
    /// step graph is unsatisfiable. Every other failure ends up in the
    /// summary.
    pub async fn run(&mut self, scenario: &Scenario) -> Result<RunSummary> {
        let steps = scenario.steps();
        let plan = graph::plan(steps)?;

        self.context = TestContext::new();
        self.session.reset();

        info!(scenario = scenario.name(), steps = steps.len(), "Running scenario");

        let mut statuses = vec![StepStatus::Pending; steps.len()];
        let mut outcomes = Vec::with_capacity(steps.len());

        for &index in &plan.order {
            let step = &steps[index];

            if let Some(reason) = self.blocked_by(step, &plan, &statuses, steps) {
                info!(step = step.id(), "Skipped: {}", reason);
                statuses[index] = StepStatus::Skipped;
                outcomes.push(StepOutcome::skipped(step.id(), reason));
                continue;
            }

            statuses[index] = StepStatus::Running;
            debug!(step = step.id(), "Running");

            let outcome = self.execute(step).await;
            statuses[index] = outcome.status;
            let reason = outcome.reason.as_deref().unwrap_or_default();
            match outcome.status {
                StepStatus::Passed => info!(step = step.id(), ms = outcome.duration_ms, "Passed"),
                StepStatus::ExpectedFailure => {
                    info!(step = step.id(), "Failed as expected: {}", reason)
                }
                _ => info!(step = step.id(), "Failed: {}", reason),
            }
            outcomes.push(outcome);
        }

        Ok(RunSummary::new(scenario.name(), outcomes))
    }

    /// Close the browser, if any
    pub async fn finish(mut self) -> Result<()> {
        if let Some(mut driver) = self.ui.take() {
            driver.close().await?;
        }
        Ok(())
    }

    /// Reason to skip `step`, if one of its inputs is missing because the
    /// producing step did not pass
    fn blocked_by(
        &self,
        step: &Step,
        plan: &Plan,
        statuses: &[StepStatus],
        steps: &[Step],
    ) -> Option<String> {
        step.required_keys()
            .iter()
            .filter(|key| !self.context.contains(key))
            .find_map(|key| {
                let producer = *plan.producers.get(key)?;
                match statuses[producer] {
                    StepStatus::Failed | StepStatus::ExpectedFailure => {
                        Some(format!("upstream step {} failed", steps[producer].id()))
                    }
                    StepStatus::Skipped => {
                        Some(format!("upstream step {} was skipped", steps[producer].id()))
                    }
                    _ => None,
                }
            })
    }

    async fn execute(&mut self, step: &Step) -> StepOutcome {
        let started = Instant::now();
        let before: HashSet<String> = self.context.keys().map(str::to_string).collect();
        let limit = self.step_timeout;

        let result = {
            let mut env = StepEnv::new(
                &mut self.context,
                &mut self.session,
                self.ui.as_deref_mut(),
            );
            let action = step.action().run(&mut env);
            match limit {
                Some(limit) => tokio::time::timeout(limit, action)
                    .await
                    .unwrap_or_else(|_| Err(Error::StepTimeout(limit.as_millis() as u64))),
                None => action.await,
            }
        };

        let result = result.and_then(|()| self.check_writes(step, &before));
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(()) => StepOutcome::passed(step.id(), duration_ms),
            Err(e) if step.is_expected_to_fail() => {
                StepOutcome::expected_failure(step.id(), &e, duration_ms)
            }
            Err(e) => StepOutcome::failed(step.id(), &e, duration_ms),
        }
    }

    /// A passing step must have written every key it declared
    fn check_writes(&self, step: &Step, before: &HashSet<String>) -> Result<()> {
        for key in self.context.keys().filter(|k| !before.contains(*k)) {
            if !step.produced_keys().iter().any(|p| p == key) {
                warn!(step = step.id(), key, "Step wrote an undeclared context key");
            }
        }
        match step
            .produced_keys()
            .iter()
            .find(|key| !self.context.contains(key))
        {
            Some(missing) => Err(Error::MissingContextKey(missing.clone())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::SimulatedBookingApi;
    use crate::scenario::step::{FailureKind, StepAction};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Writes its declared keys, or fails in a chosen way
    struct Scripted {
        writes: Vec<(&'static str, serde_json::Value)>,
        fail: Option<fn() -> Error>,
        calls: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn ok(writes: Vec<(&'static str, serde_json::Value)>, calls: &Arc<AtomicUsize>) -> Self {
            Self {
                writes,
                fail: None,
                calls: calls.clone(),
            }
        }

        fn failing(fail: fn() -> Error, calls: &Arc<AtomicUsize>) -> Self {
            Self {
                writes: Vec::new(),
                fail: Some(fail),
                calls: calls.clone(),
            }
        }
    }

    #[async_trait]
    impl StepAction for Scripted {
        async fn run(&self, env: &mut StepEnv<'_>) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(fail) = self.fail {
                return Err(fail());
            }
            for (key, value) in &self.writes {
                env.context.put(*key, value.clone());
            }
            Ok(())
        }
    }

    struct ReadsId;

    #[async_trait]
    impl StepAction for ReadsId {
        async fn run(&self, env: &mut StepEnv<'_>) -> Result<()> {
            env.context.get("id")?;
            Ok(())
        }
    }

    fn runner() -> ScenarioRunner {
        ScenarioRunner::new(Session::new(Arc::new(SimulatedBookingApi::new())))
    }

    fn crud(create: Scripted, calls: &Arc<AtomicUsize>) -> Scenario {
        Scenario::new("crud")
            .step(Step::new("create", create).produces(["id"]))
            .step(Step::new("read", Scripted::ok(vec![], calls)).requires(["id"]))
            .step(Step::new("update", Scripted::ok(vec![], calls)).requires(["id"]))
            .step(Step::new("delete", Scripted::ok(vec![], calls)).requires(["id"]))
    }

    #[tokio::test]
    async fn test_all_steps_pass_in_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scenario = crud(Scripted::ok(vec![("id", json!(1))], &calls), &calls);

        let mut runner = runner();
        let summary = runner.run(&scenario).await.unwrap();

        let order: Vec<&str> = summary.outcomes.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(order, vec!["create", "read", "update", "delete"]);
        assert_eq!(summary.passed, 4);
        assert!(summary.success());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(runner.context().get("id").unwrap(), &json!(1));
    }

    #[tokio::test]
    async fn test_failed_producer_skips_dependents_without_running_them() {
        let create_calls = Arc::new(AtomicUsize::new(0));
        let downstream_calls = Arc::new(AtomicUsize::new(0));
        let scenario = crud(
            Scripted::failing(|| Error::Assertion("status 500".into()), &create_calls),
            &downstream_calls,
        );

        let summary = runner().run(&scenario).await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 3);
        assert_eq!(downstream_calls.load(Ordering::SeqCst), 0);
        for id in ["read", "update", "delete"] {
            let outcome = summary.outcome(id).unwrap();
            assert_eq!(outcome.status, StepStatus::Skipped);
            assert_eq!(outcome.reason.as_deref(), Some("upstream step create failed"));
        }
    }

    #[tokio::test]
    async fn test_skip_propagates_transitively() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scenario = Scenario::new("chain")
            .step(
                Step::new("auth", Scripted::failing(|| Error::Auth("rejected".into()), &calls))
                    .produces(["token"]),
            )
            .step(
                Step::new("create", Scripted::ok(vec![("id", json!(1))], &calls))
                    .requires(["token"])
                    .produces(["id"]),
            )
            .step(Step::new("read", ReadsId).requires(["id"]));

        let summary = runner().run(&scenario).await.unwrap();

        assert_eq!(
            summary.outcome("read").unwrap().reason.as_deref(),
            Some("upstream step create was skipped")
        );
        assert_eq!(
            summary.outcome("auth").unwrap().failure,
            Some(FailureKind::Fault)
        );
    }

    #[tokio::test]
    async fn test_failure_does_not_hide_independent_steps() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scenario = Scenario::new("independent")
            .step(Step::new(
                "broken",
                Scripted::failing(|| Error::Assertion("nope".into()), &calls),
            ))
            .step(Step::new("fine", Scripted::ok(vec![], &calls)));

        let summary = runner().run(&scenario).await.unwrap();

        assert_eq!(summary.outcome("broken").unwrap().failure, Some(FailureKind::Assertion));
        assert_eq!(summary.outcome("fine").unwrap().status, StepStatus::Passed);
    }

    #[tokio::test]
    async fn test_expected_failure_is_counted_apart_from_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scenario = Scenario::new("slow")
            .step(Step::new("fine", Scripted::ok(vec![], &calls)))
            .step(
                Step::new(
                    "sluggish",
                    Scripted::failing(|| Error::Assertion("too slow".into()), &calls),
                )
                .produces(["timing"])
                .expected_to_fail(),
            )
            .step(Step::new("after", Scripted::ok(vec![], &calls)).requires(["timing"]));

        let summary = runner().run(&scenario).await.unwrap();

        let sluggish = summary.outcome("sluggish").unwrap();
        assert_eq!(sluggish.status, StepStatus::ExpectedFailure);
        assert_eq!(sluggish.failure, Some(FailureKind::Assertion));
        assert_eq!(summary.expected_failures, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(
            summary.outcome("after").unwrap().reason.as_deref(),
            Some("upstream step sluggish failed")
        );
        assert!(!summary.success());
    }

    #[tokio::test]
    async fn test_expected_failure_that_passes_is_passed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scenario = Scenario::new("fast")
            .step(Step::new("quick", Scripted::ok(vec![], &calls)).expected_to_fail());

        let summary = runner().run(&scenario).await.unwrap();
        assert_eq!(summary.outcome("quick").unwrap().status, StepStatus::Passed);
        assert!(summary.success());
    }

    #[tokio::test]
    async fn test_cycle_runs_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scenario = Scenario::new("cyclic")
            .step(Step::new("first", Scripted::ok(vec![], &calls)))
            .step(
                Step::new("a", Scripted::ok(vec![("x", json!(1))], &calls))
                    .requires(["y"])
                    .produces(["x"]),
            )
            .step(
                Step::new("b", Scripted::ok(vec![("y", json!(1))], &calls))
                    .requires(["x"])
                    .produces(["y"]),
            );

        let err = runner().run(&scenario).await.unwrap_err();
        assert!(matches!(err, Error::Dependency(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_step_missing_declared_write_fails() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scenario = Scenario::new("lazy")
            .step(Step::new("create", Scripted::ok(vec![], &calls)).produces(["id"]))
            .step(Step::new("read", ReadsId).requires(["id"]));

        let summary = runner().run(&scenario).await.unwrap();

        let create = summary.outcome("create").unwrap();
        assert_eq!(create.status, StepStatus::Failed);
        assert!(create.reason.as_deref().unwrap().contains("'id'"));
        assert_eq!(summary.outcome("read").unwrap().status, StepStatus::Skipped);
    }

    #[tokio::test]
    async fn test_step_timeout_fails_step() {
        struct Sleeper;

        #[async_trait]
        impl StepAction for Sleeper {
            async fn run(&self, _env: &mut StepEnv<'_>) -> Result<()> {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            }
        }

        let scenario = Scenario::new("slow").step(Step::new("sleepy", Sleeper));
        let mut runner = runner().with_step_timeout(Some(Duration::from_millis(20)));

        let summary = runner.run(&scenario).await.unwrap();
        let outcome = summary.outcome("sleepy").unwrap();
        assert_eq!(outcome.status, StepStatus::Failed);
        assert_eq!(outcome.failure, Some(FailureKind::Fault));
    }

    #[tokio::test]
    async fn test_ui_step_without_driver_fails_as_fault() {
        struct NeedsBrowser;

        #[async_trait]
        impl StepAction for NeedsBrowser {
            async fn run(&self, env: &mut StepEnv<'_>) -> Result<()> {
                env.ui()?.navigate("https://www.saucedemo.com/").await
            }
        }

        let scenario = Scenario::new("ui").step(Step::new("login", NeedsBrowser));
        let summary = runner().run(&scenario).await.unwrap();

        let outcome = summary.outcome("login").unwrap();
        assert_eq!(outcome.failure, Some(FailureKind::Fault));
        assert!(outcome.reason.as_deref().unwrap().contains("UI driver"));
    }

    #[tokio::test]
    async fn test_each_run_starts_with_fresh_context() {
        let calls = Arc::new(AtomicUsize::new(0));
        let first = Scenario::new("first")
            .step(Step::new("create", Scripted::ok(vec![("id", json!(1))], &calls)).produces(["id"]));
        let second = Scenario::new("second").step(Step::new("noop", Scripted::ok(vec![], &calls)));

        let mut runner = runner();
        runner.run(&first).await.unwrap();
        assert!(runner.context().contains("id"));
        runner.run(&second).await.unwrap();
        assert!(runner.context().is_empty());
    }
}
