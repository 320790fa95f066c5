//! Test assertions for run reports.

use crate::core::{RunStatus, StageOutcome};
use crate::pipeline::RunReport;

/// Asserts that the run ended with the expected status.
pub fn assert_run_status(report: &RunReport, expected: RunStatus) {
    assert_eq!(
        report.status, expected,
        "Expected run status {:?}, got {:?}. Failures: {:?}",
        expected, report.status, report.failures.failures
    );
}

/// Asserts the outcome of a stage.
pub fn assert_stage_outcome(report: &RunReport, stage: &str, expected: StageOutcome) {
    let actual = report.outcome(stage);
    assert_eq!(
        actual,
        Some(expected),
        "Expected stage '{}' to be {:?}, got {:?}",
        stage,
        expected,
        actual
    );
}

/// Asserts that a stage body never ran.
pub fn assert_stage_not_executed(report: &RunReport, stage: &str) {
    assert!(
        !report.executed().contains(&stage),
        "Expected stage '{}' not to run, but it did. Executed: {:?}",
        stage,
        report.executed()
    );
}

/// Asserts that the end-of-run notification reported `expected`.
pub fn assert_notified_with(report: &RunReport, expected: RunStatus) {
    assert_eq!(
        report.notification.status, expected,
        "Expected notification with {:?}, got {:?}",
        expected, report.notification.status
    );
}
