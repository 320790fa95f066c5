//! Quality gate trait and bounded wait.

use crate::config::QualityGateConfig;
use crate::errors::QualityGateError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// State reported by a quality gate server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "status")]
pub enum GateState {
    /// The analysis has not been processed yet.
    Pending,
    /// The gate passed.
    Passed,
    /// The gate reached a final non-passing status, e.g. `ERROR`.
    Failed(String),
}

impl GateState {
    /// Maps a gate status string as reported by SonarQube.
    ///
    /// Only `OK` passes; `IN_PROGRESS` and `PENDING` mean "keep waiting".
    #[must_use]
    pub fn from_status(status: &str) -> Self {
        match status.trim().to_ascii_uppercase().as_str() {
            "OK" => Self::Passed,
            "PENDING" | "IN_PROGRESS" => Self::Pending,
            other => Self::Failed(other.to_string()),
        }
    }

    /// Returns true if waiting can stop.
    #[must_use]
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// A gate that can be polled for its current state.
#[async_trait]
pub trait QualityGate: Send + Sync {
    /// Returns the analysed project key.
    fn project(&self) -> &str;

    /// Queries the current gate state.
    async fn poll(&self) -> Result<GateState, QualityGateError>;
}

/// Polls `gate` until it is final or `config.timeout()` elapses.
///
/// Poll errors are logged and retried until the ceiling.
pub async fn wait_for_quality_gate(
    gate: &dyn QualityGate,
    config: &QualityGateConfig,
) -> Result<(), QualityGateError> {
    let project = gate.project().to_string();
    let interval = config.poll_interval();

    let waiting = async {
        loop {
            match gate.poll().await {
                Ok(GateState::Passed) => return Ok(()),
                Ok(GateState::Failed(state)) => {
                    return Err(QualityGateError::Failed {
                        project: project.clone(),
                        state,
                    })
                }
                Ok(GateState::Pending) => debug!(project = %project, "quality gate pending"),
                Err(e) => warn!(project = %project, error = %e, "quality gate poll failed"),
            }
            tokio::time::sleep(interval).await;
        }
    };

    let outcome = tokio::time::timeout(config.timeout(), waiting).await;
    match outcome {
        Ok(result) => {
            if result.is_ok() {
                info!(project = %project, "quality gate passed");
            }
            result
        }
        Err(_) => Err(QualityGateError::Timeout {
            project,
            timeout_seconds: config.timeout_seconds,
        }),
    }
}

/// A gate replaying a fixed sequence of poll results.
///
/// Once the sequence is exhausted the gate keeps reporting `Pending`.
#[derive(Debug, Default)]
pub struct StaticQualityGate {
    project: String,
    states: Mutex<VecDeque<Result<GateState, QualityGateError>>>,
}

impl StaticQualityGate {
    /// Creates a gate for `project` replaying `states`.
    #[must_use]
    pub fn new(
        project: impl Into<String>,
        states: impl IntoIterator<Item = Result<GateState, QualityGateError>>,
    ) -> Self {
        Self {
            project: project.into(),
            states: Mutex::new(states.into_iter().collect()),
        }
    }

    /// Creates a gate that passes on the first poll.
    #[must_use]
    pub fn passing(project: impl Into<String>) -> Self {
        Self::new(project, [Ok(GateState::Passed)])
    }

    /// Creates a gate that never leaves `Pending`.
    #[must_use]
    pub fn pending(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            states: Mutex::new(VecDeque::new()),
        }
    }
}

#[async_trait]
impl QualityGate for StaticQualityGate {
    fn project(&self) -> &str {
        &self.project
    }

    async fn poll(&self) -> Result<GateState, QualityGateError> {
        self.states.lock().pop_front().unwrap_or(Ok(GateState::Pending))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config(timeout_seconds: u64) -> QualityGateConfig {
        QualityGateConfig {
            timeout_seconds,
            poll_interval_ms: 1,
        }
    }

    #[test]
    fn test_gate_state_from_status() {
        assert_eq!(GateState::from_status("OK"), GateState::Passed);
        assert_eq!(GateState::from_status("in_progress"), GateState::Pending);
        assert_eq!(GateState::from_status("ERROR"), GateState::Failed("ERROR".to_string()));
        assert_eq!(GateState::from_status("WARN"), GateState::Failed("WARN".to_string()));
        assert!(!GateState::Pending.is_final());
    }

    #[tokio::test]
    async fn test_wait_passes_after_pending() {
        let gate = StaticQualityGate::new(
            "app",
            [
                Ok(GateState::Pending),
                Err(QualityGateError::Poll {
                    project: "app".to_string(),
                    reason: "503".to_string(),
                }),
                Ok(GateState::Passed),
            ],
        );

        assert!(wait_for_quality_gate(&gate, &fast_config(5)).await.is_ok());
    }

    #[tokio::test]
    async fn test_wait_reports_failed_gate() {
        let gate = StaticQualityGate::new("app", [Ok(GateState::Failed("ERROR".to_string()))]);

        let err = wait_for_quality_gate(&gate, &fast_config(5)).await.unwrap_err();
        assert_eq!(
            err,
            QualityGateError::Failed {
                project: "app".to_string(),
                state: "ERROR".to_string(),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out() {
        let gate = StaticQualityGate::pending("app");

        let err = wait_for_quality_gate(&gate, &fast_config(300)).await.unwrap_err();
        assert_eq!(
            err,
            QualityGateError::Timeout {
                project: "app".to_string(),
                timeout_seconds: 300,
            }
        );
    }
}
