//! Stage running an external tool command.

use super::Stage;
use crate::context::RunContext;
use crate::errors::StageError;
use crate::tools::{
    run_checked, BuildTool, CredentialProvider, NoOpReportPublisher, ReportPublisher, ReportSpec,
    ToolCommand, ToolInvoker,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Credentials resolved right before the command runs.
#[derive(Clone)]
pub struct CredentialBinding {
    /// Where the bundle comes from.
    pub provider: Arc<dyn CredentialProvider>,
    /// Name of the bundle.
    pub bundle: String,
    /// Environment variable stem the bundle is bound to.
    pub variable: String,
}

impl std::fmt::Debug for CredentialBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialBinding")
            .field("bundle", &self.bundle)
            .field("variable", &self.variable)
            .finish()
    }
}

/// Runs one command through the tool invoker.
///
/// A non-zero exit fails the stage. Reports are published after the command
/// whether it passed or not, and their links are added to the run context.
pub struct CommandStage {
    name: String,
    invoker: Arc<dyn ToolInvoker>,
    command: ToolCommand,
    credentials: Option<CredentialBinding>,
    publisher: Arc<dyn ReportPublisher>,
    reports: Vec<ReportSpec>,
}

impl CommandStage {
    /// Creates a stage running `command`.
    #[must_use]
    pub fn new(name: impl Into<String>, invoker: Arc<dyn ToolInvoker>, command: ToolCommand) -> Self {
        Self {
            name: name.into(),
            invoker,
            command,
            credentials: None,
            publisher: Arc::new(NoOpReportPublisher),
            reports: Vec::new(),
        }
    }

    /// Creates a stage running build tool goals, e.g. `clean package`.
    #[must_use]
    pub fn build_tool(
        name: impl Into<String>,
        invoker: Arc<dyn ToolInvoker>,
        tool: BuildTool,
        goals: &str,
    ) -> Self {
        let line = tool.command(invoker.platform(), goals);
        Self::new(name, invoker, ToolCommand::new(line))
    }

    /// Binds a credential bundle to `variable` for this command only.
    #[must_use]
    pub fn with_credentials(
        mut self,
        provider: Arc<dyn CredentialProvider>,
        bundle: impl Into<String>,
        variable: impl Into<String>,
    ) -> Self {
        self.credentials = Some(CredentialBinding {
            provider,
            bundle: bundle.into(),
            variable: variable.into(),
        });
        self
    }

    /// Sets the report publisher.
    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<dyn ReportPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// Adds a report to publish after the command.
    #[must_use]
    pub fn with_report(mut self, report: ReportSpec) -> Self {
        self.reports.push(report);
        self
    }

    /// Returns the command.
    #[must_use]
    pub fn command(&self) -> &ToolCommand {
        &self.command
    }

    async fn prepare(&self) -> Result<ToolCommand, StageError> {
        let Some(ref binding) = self.credentials else {
            return Ok(self.command.clone());
        };
        let bundle = binding
            .provider
            .resolve(&binding.bundle)
            .await
            .map_err(|e| StageError::new(&self.name, e))?;
        debug!(stage = %self.name, bundle = %binding.bundle, "credentials bound");
        Ok(self.command.clone().with_credentials(&binding.variable, &bundle))
    }

    async fn publish_reports(&self, ctx: &mut RunContext) {
        for report in &self.reports {
            self.publisher.publish(report, ctx.identity()).await;
            if let Some(link) = ctx.identity().link(&report.url_path) {
                info!(stage = %self.name, report = %report.name, link = %link, "report linked");
                ctx.add_report_link(report.name.clone(), link);
            }
        }
    }
}

impl std::fmt::Debug for CommandStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandStage")
            .field("name", &self.name)
            .field("command", &self.command)
            .field("credentials", &self.credentials)
            .field("reports", &self.reports)
            .finish()
    }
}

#[async_trait]
impl Stage for CommandStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &mut RunContext) -> Result<(), StageError> {
        let command = self.prepare().await?;
        let result = run_checked(self.invoker.as_ref(), &command).await;

        self.publish_reports(ctx).await;

        result
            .map(|_| ())
            .map_err(|e| StageError::new(&self.name, e))
    }
}
