//! Per-step run reports

use colored::Colorize;

use crate::common::Result;
use crate::scenario::{FailureKind, RunSummary, StepOutcome, StepStatus};

/// Print a coloured per-step summary to stdout
pub fn print_summary(summary: &RunSummary) {
    println!(
        "\n{} {}",
        "Scenario:".blue().bold(),
        summary.scenario.white().bold()
    );

    for outcome in &summary.outcomes {
        println!("  {}", describe(outcome));
    }

    let mut totals = format!(
        "{} passed, {} failed, {} skipped",
        summary.passed, summary.failed, summary.skipped
    );
    if summary.expected_failures > 0 {
        totals.push_str(&format!(", {} failed as expected", summary.expected_failures));
    }
    if summary.success() {
        println!("\n{} {}\n", "✓".green().bold(), totals.green().bold());
    } else {
        println!("\n{} {}\n", "✗".red().bold(), totals.red().bold());
    }
}

/// Print the summaries as one JSON document to stdout
pub fn print_summary_json(summaries: &[RunSummary]) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(summaries)?);
    Ok(())
}

fn describe(outcome: &StepOutcome) -> String {
    let reason = outcome.reason.as_deref().unwrap_or_default();
    match outcome.status {
        StepStatus::Passed => format!(
            "{} {} {}",
            "✓".green(),
            outcome.id,
            format!("({} ms)", outcome.duration_ms).dimmed()
        ),
        StepStatus::Failed => {
            let kind = match outcome.failure {
                Some(FailureKind::Assertion) => "assertion",
                _ => "fault",
            };
            format!(
                "{} {} {} {}",
                "✗".red(),
                outcome.id.red(),
                format!("[{}]", kind).dimmed(),
                reason
            )
        }
        StepStatus::ExpectedFailure => format!(
            "{} {} {} {}",
            "✗".yellow(),
            outcome.id,
            "[expected]".dimmed(),
            reason
        ),
        StepStatus::Skipped => format!(
            "{} {} {}",
            "○".yellow(),
            outcome.id.yellow(),
            reason.dimmed()
        ),
        StepStatus::Pending | StepStatus::Running => {
            format!("? {} {}", outcome.id, outcome.status)
        }
    }
}
