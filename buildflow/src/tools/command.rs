//! Tool command and output types.

use super::{CredentialBundle, Secret};
use crate::errors::ToolInvocationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// A command line to run on the host.
#[derive(Clone, Default)]
pub struct ToolCommand {
    /// The command line, interpreted by the host shell.
    pub line: String,
    /// Plain environment variables.
    pub env: BTreeMap<String, String>,
    /// Working directory, defaults to the current one.
    pub working_dir: Option<PathBuf>,
    secrets: BTreeMap<String, Secret>,
}

impl ToolCommand {
    /// Creates a new command.
    #[must_use]
    pub fn new(line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            ..Default::default()
        }
    }

    /// Adds an environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Binds a credential bundle as `{variable}_{KEY}` environment variables.
    ///
    /// A bundle entry with an empty key binds to `variable` itself.
    #[must_use]
    pub fn with_credentials(mut self, variable: &str, bundle: &CredentialBundle) -> Self {
        for (key, secret) in bundle.entries() {
            let name = if key.is_empty() {
                variable.to_string()
            } else {
                format!("{variable}_{key}")
            };
            self.secrets.insert(name, secret.clone());
        }
        self
    }

    /// Returns the names of bound secret variables.
    #[must_use]
    pub fn secret_names(&self) -> Vec<&str> {
        self.secrets.keys().map(String::as_str).collect()
    }

    /// Returns every variable to set on the child process, secrets included.
    pub(crate) fn process_env(&self) -> impl Iterator<Item = (&str, &str)> {
        self.env
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .chain(self.secrets.iter().map(|(k, v)| (k.as_str(), v.expose())))
    }
}

impl fmt::Debug for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolCommand")
            .field("line", &self.line)
            .field("env", &self.env)
            .field("working_dir", &self.working_dir)
            .field("secrets", &self.secret_names())
            .finish()
    }
}

/// Exit status and captured output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// The process exit code.
    pub exit_code: i32,
    /// Captured standard output.
    #[serde(default)]
    pub stdout: String,
    /// Captured standard error.
    #[serde(default)]
    pub stderr: String,
}

impl ToolOutput {
    /// Creates a successful output.
    #[must_use]
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Creates a failed output.
    #[must_use]
    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Returns true if the command exited with code zero.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Converts a non-zero exit into an error.
    pub fn into_result(self, command: &str) -> Result<Self, ToolInvocationError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ToolInvocationError::non_zero_exit(command, self.exit_code, self.stderr))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_debug_hides_secrets() {
        let bundle = CredentialBundle::new("maven-repo-creds")
            .with_value("USR", "deployer")
            .with_value("PSW", "hunter2");
        let cmd = ToolCommand::new("mvn deploy").with_credentials("REPO", &bundle);

        let debug = format!("{cmd:?}");
        assert!(debug.contains("REPO_PSW"));
        assert!(!debug.contains("hunter2"));
        assert_eq!(cmd.secret_names(), vec!["REPO_PSW", "REPO_USR"]);
    }

    #[test]
    fn test_command_process_env_includes_secrets() {
        let bundle = CredentialBundle::new("sonar-token").with_value("", "s3cr3t");
        let cmd = ToolCommand::new("mvn sonar:sonar")
            .with_env("MAVEN_OPTS", "-Xmx1g")
            .with_credentials("SONAR_TOKEN", &bundle);

        let env: Vec<_> = cmd.process_env().collect();
        assert!(env.contains(&("MAVEN_OPTS", "-Xmx1g")));
        assert!(env.contains(&("SONAR_TOKEN", "s3cr3t")));
    }

    #[test]
    fn test_output_into_result() {
        assert!(ToolOutput::success("ok").into_result("mvn test").is_ok());

        let err = ToolOutput::failure(2, "tests failed")
            .into_result("mvn test")
            .unwrap_err();
        assert_eq!(
            err,
            ToolInvocationError::non_zero_exit("mvn test", 2, "tests failed")
        );
    }
}
