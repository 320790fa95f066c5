//! Stage waiting on an external quality gate.

use super::Stage;
use crate::config::QualityGateConfig;
use crate::context::RunContext;
use crate::core::Containment;
use crate::errors::StageError;
use crate::quality_gate::{wait_for_quality_gate, QualityGate};
use async_trait::async_trait;
use std::sync::Arc;

/// Waits until the gate passes or fails, up to the configured ceiling.
///
/// A gate that fails or times out degrades the run instead of failing it.
pub struct QualityGateStage {
    name: String,
    gate: Arc<dyn QualityGate>,
    config: QualityGateConfig,
}

impl QualityGateStage {
    /// Creates a quality gate stage.
    #[must_use]
    pub fn new(name: impl Into<String>, gate: Arc<dyn QualityGate>, config: QualityGateConfig) -> Self {
        Self {
            name: name.into(),
            gate,
            config,
        }
    }
}

impl std::fmt::Debug for QualityGateStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QualityGateStage")
            .field("name", &self.name)
            .field("project", &self.gate.project())
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl Stage for QualityGateStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &mut RunContext) -> Result<(), StageError> {
        wait_for_quality_gate(self.gate.as_ref(), &self.config)
            .await
            .map_err(|e| StageError::new(&self.name, e))
    }

    fn default_containment(&self) -> Containment {
        Containment::Degrade
    }
}
