//! The mutable context of a single pipeline run.

use super::BuildIdentity;
use crate::core::{RunPhase, RunStatus};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

/// Mutable record carried through one pipeline run.
///
/// The runner owns the context for the whole run and lends it to one
/// stage at a time. The aggregate status and lifecycle phase can only be
/// changed by the runner; stages may record flags, report links and
/// environment values.
#[derive(Debug, Clone)]
pub struct RunContext {
    identity: BuildIdentity,
    console_url: Option<String>,
    status: RunStatus,
    phase: RunPhase,
    stage_flags: BTreeMap<String, bool>,
    report_links: BTreeMap<String, String>,
    env: HashMap<String, String>,
    started_at: DateTime<Utc>,
}

impl RunContext {
    /// Creates a new run context for a build.
    #[must_use]
    pub fn new(identity: BuildIdentity) -> Self {
        Self {
            identity,
            console_url: None,
            status: RunStatus::Success,
            phase: RunPhase::Pending,
            stage_flags: BTreeMap::new(),
            report_links: BTreeMap::new(),
            env: HashMap::new(),
            started_at: Utc::now(),
        }
    }

    /// Creates a run context from the CI host environment.
    ///
    /// Variables whose name or value is not valid Unicode are left out.
    #[must_use]
    pub fn from_env() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)));
        Self::new(BuildIdentity::from_env()).with_env(vars)
    }

    /// Sets an explicit console log URL.
    #[must_use]
    pub fn with_console_url(mut self, url: impl Into<String>) -> Self {
        self.console_url = Some(url.into());
        self
    }

    /// Adds environment values visible to activation predicates.
    #[must_use]
    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Returns the build identity.
    #[must_use]
    pub fn identity(&self) -> &BuildIdentity {
        &self.identity
    }

    /// Returns the job name.
    #[must_use]
    pub fn job_name(&self) -> &str {
        &self.identity.job_name
    }

    /// Returns the build number.
    #[must_use]
    pub fn build_number(&self) -> u64 {
        self.identity.build_number
    }

    /// Returns the build URL.
    #[must_use]
    pub fn build_url(&self) -> &str {
        &self.identity.build_url
    }

    /// Returns the console log URL, derived from the build URL if not set.
    #[must_use]
    pub fn console_url(&self) -> Option<String> {
        self.console_url
            .clone()
            .or_else(|| self.identity.link("console"))
    }

    /// Returns the current aggregate status.
    #[must_use]
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Returns the current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Folds a stage result into the aggregate status.
    pub(crate) fn degrade(&mut self, status: RunStatus) {
        self.status = self.status.worsen(status);
    }

    pub(crate) fn mark_running(&mut self) {
        self.phase = self.phase.start();
    }

    pub(crate) fn mark_finished(&mut self) {
        self.phase = self.phase.finish(self.status);
    }

    /// Records a boolean flag, e.g. whether a stage completed.
    pub fn set_flag(&mut self, name: impl Into<String>, value: bool) {
        self.stage_flags.insert(name.into(), value);
    }

    /// Returns a recorded flag.
    #[must_use]
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.stage_flags.get(name).copied()
    }

    /// Returns true only if the stage ran and completed.
    #[must_use]
    pub fn completed(&self, stage: &str) -> bool {
        self.flag(stage).unwrap_or(false)
    }

    /// Returns all recorded flags.
    #[must_use]
    pub fn flags(&self) -> &BTreeMap<String, bool> {
        &self.stage_flags
    }

    /// Records a link to a published report.
    pub fn add_report_link(&mut self, name: impl Into<String>, url: impl Into<String>) {
        self.report_links.insert(name.into(), url.into());
    }

    /// Returns the published report links by name.
    #[must_use]
    pub fn report_links(&self) -> &BTreeMap<String, String> {
        &self.report_links
    }

    /// Returns an environment value.
    #[must_use]
    pub fn env(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }

    /// Sets an environment value for later stages.
    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.env.insert(key.into(), value.into());
    }

    /// Returns when the run started.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns the time elapsed since the run started.
    #[must_use]
    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new(BuildIdentity::default())
    }
}
