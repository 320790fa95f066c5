//! Run status, lifecycle phase and containment enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggregate severity of a pipeline run.
///
/// Variants are declared in severity order so the derived `Ord` gives
/// `Success < Unstable < Failure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Every executed stage succeeded, or failures were ignored.
    Success,
    /// At least one degrading stage failed.
    Unstable,
    /// A fatal stage failed and the run was aborted.
    Failure,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self::Success
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ci_result())
    }
}

impl RunStatus {
    /// Returns the more severe of `self` and `other`.
    ///
    /// Status only ever moves towards `Failure` during a run.
    #[must_use]
    pub fn worsen(self, other: Self) -> Self {
        self.max(other)
    }

    /// Returns the result name understood by CI runtimes.
    #[must_use]
    pub fn as_ci_result(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Unstable => "UNSTABLE",
            Self::Failure => "FAILURE",
        }
    }

    /// Returns the attachment color used for chat notifications.
    #[must_use]
    pub fn color(&self) -> &'static str {
        match self {
            Self::Success => "#36a64f",
            Self::Unstable => "#ff9800",
            Self::Failure => "#d32f2f",
        }
    }

    /// Returns true if the run succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Lifecycle phase of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "phase", content = "status")]
pub enum RunPhase {
    /// The run has been created but no stage has started.
    Pending,
    /// Stages are executing.
    Running,
    /// The run reached a terminal status.
    Finished(RunStatus),
}

impl Default for RunPhase {
    fn default() -> Self {
        Self::Pending
    }
}

impl RunPhase {
    /// Moves `Pending` to `Running`. Any other phase is returned unchanged.
    #[must_use]
    pub fn start(self) -> Self {
        match self {
            Self::Pending => Self::Running,
            other => other,
        }
    }

    /// Moves `Running` to `Finished`. A finished phase keeps its status.
    #[must_use]
    pub fn finish(self, status: RunStatus) -> Self {
        match self {
            Self::Pending | Self::Running => Self::Finished(status),
            finished @ Self::Finished(_) => finished,
        }
    }

    /// Returns true if the run reached a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished(_))
    }
}

/// How a stage failure affects the run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Containment {
    /// Abort the remaining stages and fail the run (default).
    #[default]
    Fatal,
    /// Record the failure, mark the run unstable, continue.
    Degrade,
    /// Record the failure, leave the status unchanged, continue.
    Ignore,
}

impl fmt::Display for Containment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fatal => write!(f, "fatal"),
            Self::Degrade => write!(f, "degrade"),
            Self::Ignore => write!(f, "ignore"),
        }
    }
}

impl Containment {
    /// Returns the status a failure under this policy contributes.
    #[must_use]
    pub fn failure_status(&self) -> Option<RunStatus> {
        match self {
            Self::Fatal => Some(RunStatus::Failure),
            Self::Degrade => Some(RunStatus::Unstable),
            Self::Ignore => None,
        }
    }

    /// Returns true if a failure under this policy aborts the run.
    #[must_use]
    pub fn aborts(&self) -> bool {
        matches!(self, Self::Fatal)
    }
}

/// What happened to one stage during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    /// The stage body completed.
    Passed,
    /// The stage body failed.
    Failed,
    /// The activation predicate evaluated false.
    Skipped,
    /// The run was aborted before the stage was reached.
    NotRun,
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
            Self::NotRun => write!(f, "not_run"),
        }
    }
}

impl StageOutcome {
    /// Returns true if the stage body actually ran.
    #[must_use]
    pub fn was_executed(&self) -> bool {
        matches!(self, Self::Passed | Self::Failed)
    }
}
