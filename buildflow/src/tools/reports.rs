//! Report publishing.
//!
//! Publishing is fire-and-forget: failures are logged and never reach the
//! run status.

use crate::context::BuildIdentity;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A report directory produced by a build tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSpec {
    /// Short report name, e.g. `coverage`.
    pub name: String,
    /// Directory holding the report, relative to the workspace.
    pub directory: PathBuf,
    /// Path of the published report below the build URL.
    pub url_path: String,
}

impl ReportSpec {
    /// Creates a new report spec.
    #[must_use]
    pub fn new(name: impl Into<String>, directory: impl Into<PathBuf>, url_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            directory: directory.into(),
            url_path: url_path.into(),
        }
    }
}

/// Publishes report directories to a report host.
#[async_trait]
pub trait ReportPublisher: Send + Sync {
    /// Publishes a report. Failures are handled by the publisher.
    async fn publish(&self, report: &ReportSpec, build: &BuildIdentity);
}

/// Publisher that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpReportPublisher;

#[async_trait]
impl ReportPublisher for NoOpReportPublisher {
    async fn publish(&self, _report: &ReportSpec, _build: &BuildIdentity) {}
}

/// Publisher copying reports into `{root}/{job}/{build}/{report}`.
#[derive(Debug, Clone)]
pub struct DirectoryReportPublisher {
    workspace: PathBuf,
    archive_root: PathBuf,
}

impl DirectoryReportPublisher {
    /// Creates a publisher reading from `workspace` and writing below `archive_root`.
    #[must_use]
    pub fn new(workspace: impl Into<PathBuf>, archive_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            archive_root: archive_root.into(),
        }
    }

    /// Returns where a report for a build is archived.
    #[must_use]
    pub fn destination(&self, report: &ReportSpec, build: &BuildIdentity) -> PathBuf {
        self.archive_root
            .join(&build.job_name)
            .join(build.build_number.to_string())
            .join(&report.name)
    }
}

#[async_trait]
impl ReportPublisher for DirectoryReportPublisher {
    async fn publish(&self, report: &ReportSpec, build: &BuildIdentity) {
        let source = self.workspace.join(&report.directory);
        let target = self.destination(report, build);
        let report_name = report.name.clone();

        let copy_target = target.clone();
        let result = tokio::task::spawn_blocking(move || copy_dir(&source, &copy_target)).await;

        match result {
            Ok(Ok(files)) => info!(report = %report_name, files, target = %target.display(), "report published"),
            Ok(Err(e)) => warn!(report = %report_name, error = %e, "report publishing failed"),
            Err(e) => warn!(report = %report_name, error = %e, "report publishing task failed"),
        }
    }
}

fn copy_dir(source: &Path, target: &Path) -> io::Result<usize> {
    std::fs::create_dir_all(target)?;
    let mut copied = 0;
    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        let path = entry.path();
        let dest = target.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copied += copy_dir(&path, &dest)?;
        } else {
            std::fs::copy(&path, &dest)?;
            copied += 1;
        }
    }
    Ok(copied)
}
