//! Stage sending a notification in the middle of a run.

use super::Stage;
use crate::context::RunContext;
use crate::errors::StageError;
use crate::notify::Notifier;
use async_trait::async_trait;
use std::sync::Arc;

/// Reports the current run status, e.g. before a long deployment.
///
/// The stage fails if any channel fails, so its containment decides whether
/// a delivery problem matters. This is separate from the one notification
/// the runner sends when the run ends.
#[derive(Debug)]
pub struct NotifyStage {
    name: String,
    notifier: Arc<Notifier>,
}

impl NotifyStage {
    /// Creates a notification stage.
    #[must_use]
    pub fn new(name: impl Into<String>, notifier: Arc<Notifier>) -> Self {
        Self {
            name: name.into(),
            notifier,
        }
    }
}

#[async_trait]
impl Stage for NotifyStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &mut RunContext) -> Result<(), StageError> {
        self.notifier
            .notify(ctx.status(), ctx)
            .await
            .map(|_| ())
            .map_err(|e| StageError::new(&self.name, anyhow::Error::new(e)))
    }
}
