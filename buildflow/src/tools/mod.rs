//! External collaborators a stage calls out to.
//!
//! This module provides:
//! - The tool invoker boundary with POSIX shell and Windows batch variants
//! - Build tool command conventions (Maven, Gradle)
//! - Credential resolution scoped to a single command
//! - Fire-and-forget report publishing

mod build_tool;
mod command;
mod credentials;
mod invoker;
mod reports;

pub use build_tool::BuildTool;
pub use command::{ToolCommand, ToolOutput};
pub use credentials::{
    CredentialBundle, CredentialProvider, EnvCredentialProvider, Secret, StaticCredentialProvider,
};
pub use invoker::{platform_invoker, run_checked, BatchInvoker, Platform, ShellInvoker, ToolInvoker};
pub use reports::{DirectoryReportPublisher, NoOpReportPublisher, ReportPublisher, ReportSpec};

#[cfg(test)]
pub use invoker::MockToolInvoker;
