//! Per-stage execution records.

use super::{Containment, StageOutcome};
use serde::{Deserialize, Serialize};

/// Record of one stage in a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    /// The stage name.
    pub name: String,
    /// The declared containment policy.
    pub containment: Containment,
    /// What happened to the stage.
    pub outcome: StageOutcome,
    /// Execution time in milliseconds, zero when the body did not run.
    #[serde(default)]
    pub duration_ms: f64,
    /// Error message for failed stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StageRecord {
    /// Creates a record for a stage whose body completed.
    #[must_use]
    pub fn passed(name: impl Into<String>, containment: Containment, duration_ms: f64) -> Self {
        Self {
            name: name.into(),
            containment,
            outcome: StageOutcome::Passed,
            duration_ms,
            error: None,
        }
    }

    /// Creates a record for a stage whose body failed.
    #[must_use]
    pub fn failed(
        name: impl Into<String>,
        containment: Containment,
        duration_ms: f64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            containment,
            outcome: StageOutcome::Failed,
            duration_ms,
            error: Some(error.into()),
        }
    }

    /// Creates a record for a stage that did not execute.
    #[must_use]
    pub fn untouched(name: impl Into<String>, containment: Containment, outcome: StageOutcome) -> Self {
        Self {
            name: name.into(),
            containment,
            outcome,
            duration_ms: 0.0,
            error: None,
        }
    }
}
