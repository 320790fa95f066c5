//! Stage trait and implementations.
//!
//! Stages are the units of work a pipeline runs in order. A stage either
//! completes or fails with a [`StageError`]; what a failure does to the run
//! is decided by the containment policy of its [`StageSpec`](crate::pipeline::StageSpec).

mod command;
mod notify;
mod quality_gate;

pub use command::{CommandStage, CredentialBinding};
pub use notify::NotifyStage;
pub use quality_gate::QualityGateStage;

use crate::context::RunContext;
use crate::core::Containment;
use crate::errors::StageError;
use async_trait::async_trait;
use std::fmt::Debug;

/// Trait for pipeline stages.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Executes the stage.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The run context, lent to one stage at a time
    ///
    /// # Errors
    ///
    /// Returns a [`StageError`] if the stage body failed.
    async fn execute(&self, ctx: &mut RunContext) -> Result<(), StageError>;

    /// Returns the containment a stage spec starts with.
    fn default_containment(&self) -> Containment {
        Containment::Fatal
    }
}

/// A simple function-based stage.
pub struct FnStage<F>
where
    F: Fn(&mut RunContext) -> anyhow::Result<()> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&mut RunContext) -> anyhow::Result<()> + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&mut RunContext) -> anyhow::Result<()> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(&mut RunContext) -> anyhow::Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &mut RunContext) -> Result<(), StageError> {
        (self.func)(ctx).map_err(|e| StageError::new(&self.name, e))
    }
}

/// A stage that always completes without doing anything.
#[derive(Debug, Clone)]
pub struct NoOpStage {
    name: String,
}

impl NoOpStage {
    /// Creates a new no-op stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Stage for NoOpStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &mut RunContext) -> Result<(), StageError> {
        Ok(())
    }
}
