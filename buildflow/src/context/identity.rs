//! Build identity for tracking pipeline runs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Environment variable holding the job name.
pub const JOB_NAME_VAR: &str = "JOB_NAME";
/// Environment variable holding the build number.
pub const BUILD_NUMBER_VAR: &str = "BUILD_NUMBER";
/// Environment variable holding the build URL.
pub const BUILD_URL_VAR: &str = "BUILD_URL";

/// Identifies one build of one job on the CI host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildIdentity {
    /// Unique ID for this run.
    pub run_id: Uuid,
    /// The job (project) name.
    pub job_name: String,
    /// The build number within the job.
    pub build_number: u64,
    /// Link to the build page on the CI host.
    #[serde(default)]
    pub build_url: String,
}

impl Default for BuildIdentity {
    fn default() -> Self {
        Self::new("local", 0)
    }
}

impl BuildIdentity {
    /// Creates a new identity with a generated run ID.
    #[must_use]
    pub fn new(job_name: impl Into<String>, build_number: u64) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            job_name: job_name.into(),
            build_number,
            build_url: String::new(),
        }
    }

    /// Sets the build URL.
    #[must_use]
    pub fn with_build_url(mut self, url: impl Into<String>) -> Self {
        self.build_url = url.into();
        self
    }

    /// Reads the identity from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the identity through a variable lookup.
    ///
    /// Missing or unparsable values fall back to the defaults.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let job_name = lookup(JOB_NAME_VAR)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.job_name);
        let build_number = lookup(BUILD_NUMBER_VAR)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(defaults.build_number);
        let build_url = lookup(BUILD_URL_VAR).unwrap_or_default();

        Self {
            run_id: defaults.run_id,
            job_name,
            build_number,
            build_url,
        }
    }

    /// Returns a link below the build page, e.g. `console` or `testReport/`.
    #[must_use]
    pub fn link(&self, path: &str) -> Option<String> {
        if self.build_url.is_empty() {
            return None;
        }
        let base = self.build_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Some(format!("{base}/{path}"))
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("run_id".to_string(), serde_json::json!(self.run_id.to_string()));
        map.insert("job_name".to_string(), serde_json::json!(self.job_name));
        map.insert("build_number".to_string(), serde_json::json!(self.build_number));
        map.insert("build_url".to_string(), serde_json::json!(self.build_url));
        map
    }
}
