//! Host tool invocation.
//!
//! One [`ToolInvoker`] trait with two process-backed implementations. The
//! platform is picked once, when the invoker is built, so stage bodies never
//! branch on the host OS themselves.

use super::{ToolCommand, ToolOutput};
use crate::errors::ToolInvocationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Host operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Unix-like hosts, commands run through `sh -c`.
    Posix,
    /// Windows hosts, commands run through `cmd /C`.
    Windows,
}

impl Platform {
    /// Detects the platform this process runs on.
    #[must_use]
    pub fn detect() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Posix
        }
    }

    /// Returns true on Unix-like hosts.
    #[must_use]
    pub fn is_unix(&self) -> bool {
        matches!(self, Self::Posix)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Posix => write!(f, "posix"),
            Self::Windows => write!(f, "windows"),
        }
    }
}

/// Runs commands against the host.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Returns the platform whose shell this invoker uses.
    fn platform(&self) -> Platform;

    /// Runs a command and waits for it to exit.
    ///
    /// A non-zero exit code is returned as a normal [`ToolOutput`]; only
    /// failures to run the command at all are errors.
    async fn invoke(&self, command: &ToolCommand) -> Result<ToolOutput, ToolInvocationError>;
}

/// Runs a command and treats a non-zero exit code as an error.
pub async fn run_checked(
    invoker: &dyn ToolInvoker,
    command: &ToolCommand,
) -> Result<ToolOutput, ToolInvocationError> {
    invoker.invoke(command).await?.into_result(&command.line)
}

/// Returns the invoker matching the current host.
#[must_use]
pub fn platform_invoker() -> Arc<dyn ToolInvoker> {
    match Platform::detect() {
        Platform::Posix => Arc::new(ShellInvoker::new()),
        Platform::Windows => Arc::new(BatchInvoker::new()),
    }
}

/// Invoker running commands through the POSIX shell.
#[derive(Debug, Clone)]
pub struct ShellInvoker {
    shell: String,
}

impl Default for ShellInvoker {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }
}

impl ShellInvoker {
    /// Creates an invoker using `sh`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a different shell binary, e.g. `bash`.
    #[must_use]
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }
}

#[async_trait]
impl ToolInvoker for ShellInvoker {
    fn platform(&self) -> Platform {
        Platform::Posix
    }

    async fn invoke(&self, command: &ToolCommand) -> Result<ToolOutput, ToolInvocationError> {
        run_process(&self.shell, "-c", command).await
    }
}

/// Invoker running commands through the Windows command interpreter.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchInvoker;

impl BatchInvoker {
    /// Creates a batch invoker.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolInvoker for BatchInvoker {
    fn platform(&self) -> Platform {
        Platform::Windows
    }

    async fn invoke(&self, command: &ToolCommand) -> Result<ToolOutput, ToolInvocationError> {
        run_process("cmd", "/C", command).await
    }
}

async fn run_process(
    program: &str,
    flag: &str,
    command: &ToolCommand,
) -> Result<ToolOutput, ToolInvocationError> {
    debug!(program, command = %command.line, "invoking tool");

    let mut process = tokio::process::Command::new(program);
    process
        .arg(flag)
        .arg(&command.line)
        .envs(command.process_env())
        .kill_on_drop(true);
    if let Some(ref dir) = command.working_dir {
        process.current_dir(dir);
    }

    let output = process
        .output()
        .await
        .map_err(|e| ToolInvocationError::spawn(&command.line, e.to_string()))?;

    let Some(exit_code) = output.status.code() else {
        return Err(ToolInvocationError::Terminated {
            command: command.line.clone(),
        });
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if exit_code == 0 {
        info!(command = %command.line, exit_code, "tool finished");
    } else {
        warn!(command = %command.line, exit_code, stderr = %stderr, "tool exited with failure");
    }

    Ok(ToolOutput {
        exit_code,
        stdout,
        stderr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_detect() {
        let platform = Platform::detect();
        assert_eq!(platform.is_unix(), !cfg!(windows));
        assert_eq!(platform_invoker().platform(), platform);
    }

    #[tokio::test]
    async fn test_run_checked_maps_non_zero_exit() {
        let mut invoker = MockToolInvoker::new();
        invoker
            .expect_invoke()
            .returning(|_| Ok(ToolOutput::failure(1, "BUILD FAILURE")));

        let err = run_checked(&invoker, &ToolCommand::new("mvn package"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolInvocationError::NonZeroExit { exit_code: 1, .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_invoker_captures_output() {
        let output = ShellInvoker::new()
            .invoke(&ToolCommand::new("echo \"$GREETING\"; exit 3").with_env("GREETING", "hello"))
            .await
            .unwrap();

        assert_eq!(output.exit_code, 3);
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_invoker_missing_shell() {
        let err = ShellInvoker::new()
            .with_shell("/definitely/not/a/shell")
            .invoke(&ToolCommand::new("true"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolInvocationError::Spawn { .. }));
    }
}
