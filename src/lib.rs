//! Scenario harness - dependency-ordered API and UI test scenarios
//!
//! Steps declare the context keys they require and produce; the runner
//! orders them, retries transient transport faults, and skips steps whose
//! inputs a failed step never wrote.

pub mod booking;
pub mod cli;
pub mod commands;
pub mod common;
pub mod retry;
pub mod scenario;
pub mod session;
pub mod testing;
pub mod ui;

// Re-export commonly used types for tests
pub use common::{Config, Error, Result};
pub use retry::{with_retry, RetryPolicy};
pub use scenario::{RunSummary, Scenario, ScenarioRunner, Step, StepStatus, TestContext};
pub use session::{Credentials, Session};
