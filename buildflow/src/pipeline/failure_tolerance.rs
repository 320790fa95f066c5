//! Failure bookkeeping for pipeline runs.
//!
//! Every failed stage leaves a [`FailureRecord`] with the containment policy
//! it failed under, so a finished run can explain why it ended where it did.

use crate::core::Containment;
use crate::errors::StageError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

/// Record of a stage failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Stage name.
    pub stage: String,
    /// Error message.
    pub error: String,
    /// Error type name.
    pub error_type: String,
    /// Policy the stage failed under.
    pub containment: Containment,
    /// Unix timestamp of the failure.
    pub timestamp: f64,
    /// Additional context.
    pub context: HashMap<String, serde_json::Value>,
}

impl FailureRecord {
    /// Creates a new failure record.
    #[must_use]
    pub fn new(stage: impl Into<String>, error: impl Into<String>) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        Self {
            stage: stage.into(),
            error: error.into(),
            error_type: "StageError".to_string(),
            containment: Containment::default(),
            timestamp: now,
            context: HashMap::new(),
        }
    }

    /// Creates a record from a stage error.
    #[must_use]
    pub fn from_error(err: &StageError, containment: Containment) -> Self {
        Self::new(&err.stage, err.cause.to_string())
            .with_error_type(err.error_type())
            .with_containment(containment)
    }

    /// Sets the error type.
    #[must_use]
    pub fn with_error_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = error_type.into();
        self
    }

    /// Sets the containment policy.
    #[must_use]
    pub fn with_containment(mut self, containment: Containment) -> Self {
        self.containment = containment;
        self
    }

    /// Adds context.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }
}

/// Summary of failures during a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FailureSummary {
    /// Total number of stages.
    pub total_stages: usize,
    /// Number of completed stages.
    pub completed_stages: usize,
    /// Number of failed stages.
    pub failed_stages: usize,
    /// Number of stages whose activation was false.
    pub skipped_stages: usize,
    /// List of failure records.
    pub failures: Vec<FailureRecord>,
}

impl FailureSummary {
    /// Creates a new failure summary.
    #[must_use]
    pub fn new(total_stages: usize) -> Self {
        Self {
            total_stages,
            ..Self::default()
        }
    }

    /// Returns the share of stages that completed.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total_stages == 0 {
            return 0.0;
        }
        self.completed_stages as f64 / self.total_stages as f64
    }

    /// Returns true if any failures occurred.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Returns the number of stages that never started because the run aborted.
    #[must_use]
    pub fn not_run_stages(&self) -> usize {
        self.total_stages
            .saturating_sub(self.completed_stages + self.failed_stages + self.skipped_stages)
    }

    /// Converts to dictionary.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("total_stages".to_string(), serde_json::json!(self.total_stages));
        map.insert("completed_stages".to_string(), serde_json::json!(self.completed_stages));
        map.insert("failed_stages".to_string(), serde_json::json!(self.failed_stages));
        map.insert("skipped_stages".to_string(), serde_json::json!(self.skipped_stages));
        map.insert("not_run_stages".to_string(), serde_json::json!(self.not_run_stages()));
        map.insert("success_rate".to_string(), serde_json::json!(self.success_rate()));
        map.insert("failures".to_string(), serde_json::json!(
            self.failures.iter().map(|f| {
                serde_json::json!({
                    "stage": f.stage,
                    "error": f.error,
                    "error_type": f.error_type,
                    "containment": f.containment,
                    "timestamp": f.timestamp,
                })
            }).collect::<Vec<_>>()
        ));
        map
    }
}

/// Collects stage results during a run.
#[derive(Debug, Default)]
pub struct FailureCollector {
    failures: Vec<FailureRecord>,
    failed_stages: HashSet<String>,
    completed_stages: HashSet<String>,
    skipped_stages: HashSet<String>,
}

impl FailureCollector {
    /// Creates a new failure collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a stage failure.
    pub fn record_failure(&mut self, record: FailureRecord) {
        self.failed_stages.insert(record.stage.clone());
        self.failures.push(record);
    }

    /// Records a stage completion.
    pub fn record_completion(&mut self, stage: &str) {
        self.completed_stages.insert(stage.to_string());
    }

    /// Records a stage whose activation was false.
    pub fn record_skip(&mut self, stage: &str) {
        self.skipped_stages.insert(stage.to_string());
    }

    /// Returns true once a fatal failure has been recorded.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.failures.iter().any(|f| f.containment.aborts())
    }

    /// Creates a summary of the run.
    #[must_use]
    pub fn summary(&self, total_stages: usize) -> FailureSummary {
        FailureSummary {
            total_stages,
            completed_stages: self.completed_stages.len(),
            failed_stages: self.failed_stages.len(),
            skipped_stages: self.skipped_stages.len(),
            failures: self.failures.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ToolInvocationError;

    #[test]
    fn test_failure_record_from_error() {
        let err = StageError::new("build", ToolInvocationError::non_zero_exit("mvn -B package", 1, "BUILD FAILURE"));
        let record = FailureRecord::from_error(&err, Containment::Fatal)
            .with_context("attempt", serde_json::json!(1));

        assert_eq!(record.stage, "build");
        assert_eq!(record.error_type, "ToolInvocationError");
        assert_eq!(record.containment, Containment::Fatal);
        assert!(record.error.contains("mvn -B package"));
        assert!(record.timestamp > 0.0);
        assert_eq!(record.context["attempt"], 1);
    }

    #[test]
    fn test_failure_summary() {
        let mut summary = FailureSummary::new(10);
        summary.completed_stages = 6;
        summary.failed_stages = 2;
        summary.skipped_stages = 1;

        assert!((summary.success_rate() - 0.6).abs() < 0.001);
        assert_eq!(summary.not_run_stages(), 1);
        assert!(!summary.has_failures());

        summary.failures.push(FailureRecord::new("stage1", "error"));
        assert!(summary.has_failures());
    }

    #[test]
    fn test_collector_stops_only_on_fatal() {
        let mut collector = FailureCollector::new();
        assert!(!collector.should_stop());

        collector.record_failure(FailureRecord::new("lint", "warnings").with_containment(Containment::Ignore));
        collector.record_failure(FailureRecord::new("analysis", "timeout").with_containment(Containment::Degrade));
        assert!(!collector.should_stop());
        assert_eq!(collector.summary(3).failed_stages, 2);

        collector.record_failure(FailureRecord::new("build", "exit 1").with_containment(Containment::Fatal));
        assert!(collector.should_stop());
    }

    #[test]
    fn test_collector_summary() {
        let mut collector = FailureCollector::new();

        collector.record_completion("checkout");
        collector.record_completion("build");
        collector.record_skip("deploy");
        collector.record_failure(FailureRecord::new("test", "error"));

        let summary = collector.summary(5);

        assert_eq!(summary.total_stages, 5);
        assert_eq!(summary.completed_stages, 2);
        assert_eq!(summary.failed_stages, 1);
        assert_eq!(summary.skipped_stages, 1);
        assert_eq!(summary.not_run_stages(), 1);
        assert_eq!(summary.to_dict()["failures"][0]["stage"], "test");
    }
}
