//! SonarQube quality gate client.

use super::{GateState, QualityGate};
use crate::errors::QualityGateError;
use crate::tools::Secret;
use async_trait::async_trait;
use serde::Deserialize;

/// Scanner metadata written to `report-task.txt` after an analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportTask {
    /// The analysed project key.
    pub project_key: String,
    /// Base URL of the SonarQube server.
    pub server_url: String,
    /// Compute engine task processing the analysis.
    pub ce_task_id: Option<String>,
}

impl ReportTask {
    /// Parses the `key=value` lines of a report task file.
    #[must_use]
    pub fn parse(contents: &str) -> Option<Self> {
        let mut project_key = None;
        let mut server_url = None;
        let mut ce_task_id = None;

        for line in contents.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().replace("\\:", ":");
            match key.trim() {
                "projectKey" => project_key = Some(value),
                "serverUrl" => server_url = Some(value),
                "ceTaskId" => ce_task_id = Some(value),
                _ => {}
            }
        }

        Some(Self {
            project_key: project_key?,
            server_url: server_url?,
            ce_task_id,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CeTaskResponse {
    task: CeTask,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CeTask {
    status: String,
    analysis_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectStatusResponse {
    project_status: ProjectStatus,
}

#[derive(Debug, Deserialize)]
struct ProjectStatus {
    status: String,
}

/// Quality gate backed by the SonarQube web API.
#[derive(Debug, Clone)]
pub struct SonarQualityGate {
    client: reqwest::Client,
    server_url: String,
    project_key: String,
    ce_task_id: Option<String>,
    token: Option<Secret>,
}

impl SonarQualityGate {
    /// Creates a gate polling the project's current status.
    #[must_use]
    pub fn new(server_url: impl Into<String>, project_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            server_url: server_url.into().trim_end_matches('/').to_string(),
            project_key: project_key.into(),
            ce_task_id: None,
            token: None,
        }
    }

    /// Creates a gate waiting for the analysis described by a report task.
    #[must_use]
    pub fn from_report_task(task: ReportTask) -> Self {
        let mut gate = Self::new(task.server_url, task.project_key);
        gate.ce_task_id = task.ce_task_id;
        gate
    }

    /// Authenticates with a user token.
    #[must_use]
    pub fn with_token(mut self, token: Secret) -> Self {
        self.token = Some(token);
        self
    }

    fn poll_error(&self, reason: impl Into<String>) -> QualityGateError {
        QualityGateError::Poll {
            project: self.project_key.clone(),
            reason: reason.into(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, QualityGateError> {
        let mut request = self
            .client
            .get(format!("{}{path}", self.server_url))
            .query(query);
        if let Some(ref token) = self.token {
            request = request.basic_auth(token.expose(), Some(""));
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.poll_error(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(self.poll_error(format!("HTTP {status}")));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| self.poll_error(e.to_string()))
    }

    async fn project_status(&self, analysis_id: Option<&str>) -> Result<GateState, QualityGateError> {
        let query = match analysis_id {
            Some(id) => [("analysisId", id)],
            None => [("projectKey", self.project_key.as_str())],
        };
        let body: ProjectStatusResponse = self
            .get_json("/api/qualitygates/project_status", &query)
            .await?;
        Ok(GateState::from_status(&body.project_status.status))
    }
}

#[async_trait]
impl QualityGate for SonarQualityGate {
    fn project(&self) -> &str {
        &self.project_key
    }

    async fn poll(&self) -> Result<GateState, QualityGateError> {
        let Some(ref task_id) = self.ce_task_id else {
            return self.project_status(None).await;
        };

        let body: CeTaskResponse = self.get_json("/api/ce/task", &[("id", task_id.as_str())]).await?;
        match body.task.status.as_str() {
            "PENDING" | "IN_PROGRESS" => Ok(GateState::Pending),
            "SUCCESS" => self.project_status(body.task.analysis_id.as_deref()).await,
            other => Err(self.poll_error(format!("analysis task ended with {other}"))),
        }
    }
}
