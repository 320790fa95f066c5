//! Error types for the buildflow pipeline core.
//!
//! The taxonomy mirrors the collaborators a run talks to: external tools,
//! quality gates, credential stores and notification channels. Only
//! [`StageError`] influences the run status; notification errors are
//! reported and swallowed by the runner.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for buildflow operations.
#[derive(Debug, Error)]
pub enum BuildflowError {
    /// A pipeline validation error occurred.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// An external tool failed.
    #[error("{0}")]
    Tool(#[from] ToolInvocationError),

    /// A quality gate did not pass.
    #[error("{0}")]
    QualityGate(#[from] QualityGateError),

    /// A credential bundle could not be resolved.
    #[error("{0}")]
    Credential(#[from] CredentialResolutionError),

    /// One or more notification channels failed.
    #[error("{0}")]
    Notify(#[from] NotifyError),

    /// Configuration could not be loaded.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error raised when an external command cannot be run or exits non-zero.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolInvocationError {
    /// The command ran and returned a non-zero exit code.
    #[error("Command '{command}' exited with code {exit_code}")]
    NonZeroExit {
        /// The command line.
        command: String,
        /// The exit code.
        exit_code: i32,
        /// Captured standard error.
        stderr: String,
    },

    /// The command could not be started.
    #[error("Failed to spawn '{command}': {reason}")]
    Spawn {
        /// The command line.
        command: String,
        /// The reason reported by the OS.
        reason: String,
    },

    /// The command was terminated by a signal.
    #[error("Command '{command}' was terminated without an exit code")]
    Terminated {
        /// The command line.
        command: String,
    },
}

impl ToolInvocationError {
    /// Creates a non-zero exit error.
    #[must_use]
    pub fn non_zero_exit(command: impl Into<String>, exit_code: i32, stderr: impl Into<String>) -> Self {
        Self::NonZeroExit {
            command: command.into(),
            exit_code,
            stderr: stderr.into(),
        }
    }

    /// Creates a spawn error.
    #[must_use]
    pub fn spawn(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Spawn {
            command: command.into(),
            reason: reason.into(),
        }
    }
}

/// Error raised while waiting for an external quality gate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QualityGateError {
    /// The gate did not reach a final state before the ceiling.
    #[error("Quality gate for '{project}' timed out after {timeout_seconds}s")]
    Timeout {
        /// The analysed project key.
        project: String,
        /// The wait ceiling in seconds.
        timeout_seconds: u64,
    },

    /// The gate reached a final state other than passed.
    #[error("Quality gate for '{project}' failed with status {state}")]
    Failed {
        /// The analysed project key.
        project: String,
        /// The reported gate state.
        state: String,
    },

    /// The gate server could not be queried.
    #[error("Quality gate poll for '{project}' failed: {reason}")]
    Poll {
        /// The analysed project key.
        project: String,
        /// The failure reason.
        reason: String,
    },
}

/// Error raised when a named credential bundle cannot be resolved.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialResolutionError {
    /// No bundle with this name exists.
    #[error("Credential bundle not found: {name}")]
    NotFound {
        /// The bundle name.
        name: String,
    },

    /// The bundle exists but a required field is missing.
    #[error("Credential bundle '{name}' is incomplete: missing {field}")]
    Incomplete {
        /// The bundle name.
        name: String,
        /// The missing field.
        field: String,
    },
}

/// Why a stage body failed.
#[derive(Debug, Error)]
pub enum StageFailure {
    /// An external tool failed.
    #[error(transparent)]
    Tool(#[from] ToolInvocationError),

    /// A quality gate did not pass.
    #[error(transparent)]
    QualityGate(#[from] QualityGateError),

    /// Credentials for the stage could not be resolved.
    #[error(transparent)]
    Credential(#[from] CredentialResolutionError),

    /// Any other failure raised from a stage body.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StageFailure {
    /// Returns a stable name for the failure kind.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Tool(_) => "ToolInvocationError",
            Self::QualityGate(_) => "QualityGateError",
            Self::Credential(_) => "CredentialResolutionError",
            Self::Other(_) => "StageError",
        }
    }
}

/// A failed stage execution.
#[derive(Debug, Error)]
#[error("Stage '{stage}' failed: {cause}")]
pub struct StageError {
    /// The failing stage.
    pub stage: String,
    /// The underlying failure.
    #[source]
    pub cause: StageFailure,
}

impl StageError {
    /// Creates a new stage error.
    #[must_use]
    pub fn new(stage: impl Into<String>, cause: impl Into<StageFailure>) -> Self {
        Self {
            stage: stage.into(),
            cause: cause.into(),
        }
    }

    /// Creates a stage error from a plain message.
    #[must_use]
    pub fn msg(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(stage, anyhow::anyhow!(message.into()))
    }

    /// Returns the failure kind name.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        self.cause.error_type()
    }
}

/// Error raised by a single notification channel.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelError {
    /// The message could not be handed to the transport.
    #[error("Channel '{channel}' transport error: {reason}")]
    Transport {
        /// The channel name.
        channel: String,
        /// The failure reason.
        reason: String,
    },

    /// The remote end rejected the message.
    #[error("Channel '{channel}' rejected the message with status {status}")]
    Rejected {
        /// The channel name.
        channel: String,
        /// The status reported by the remote end.
        status: u16,
    },

    /// The channel is not usable with its current configuration.
    #[error("Channel '{channel}' is misconfigured: {reason}")]
    Misconfigured {
        /// The channel name.
        channel: String,
        /// What is wrong.
        reason: String,
    },
}

impl ChannelError {
    /// Creates a transport error.
    #[must_use]
    pub fn transport(channel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transport {
            channel: channel.into(),
            reason: reason.into(),
        }
    }

    /// Returns the name of the channel that failed.
    #[must_use]
    pub fn channel(&self) -> &str {
        match self {
            Self::Transport { channel, .. }
            | Self::Rejected { channel, .. }
            | Self::Misconfigured { channel, .. } => channel,
        }
    }
}

/// Error raised when notification delivery failed on at least one channel.
#[derive(Debug, Clone, Error)]
#[error("Notification delivery failed on {} of {attempted} channel(s)", failures.len())]
pub struct NotifyError {
    /// Number of channels a delivery was attempted on.
    pub attempted: usize,
    /// The individual channel failures.
    pub failures: Vec<ChannelError>,
}

impl NotifyError {
    /// Returns the names of the failed channels.
    #[must_use]
    pub fn failed_channels(&self) -> Vec<&str> {
        self.failures.iter().map(ChannelError::channel).collect()
    }
}

/// Error raised when pipeline validation fails.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            fix_hint: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("message".to_string(), serde_json::json!(self.message));
        map.insert("stages".to_string(), serde_json::json!(self.stages));
        if let Some(ref hint) = self.fix_hint {
            map.insert("fix_hint".to_string(), serde_json::json!(hint));
        }
        map
    }
}

/// Error raised when configuration cannot be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Read {
        /// The file path.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// The configuration could not be parsed.
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    /// An environment override had an unusable value.
    #[error("Invalid value for {key}: {value}")]
    InvalidEnv {
        /// The environment variable.
        key: String,
        /// The offending value.
        value: String,
    },
}
