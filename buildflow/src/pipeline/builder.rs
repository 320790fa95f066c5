//! Pipeline builder with validation.

use super::{Pipeline, StageSpec};
use crate::errors::PipelineValidationError;
use crate::events::{EventSink, LoggingEventSink};
use crate::notify::Notifier;
use crate::stages::Stage;
use std::collections::HashSet;
use std::sync::Arc;

/// Builder for creating validated pipelines.
pub struct PipelineBuilder {
    /// The pipeline name.
    name: String,
    /// The stage specifications in run order.
    stages: Vec<StageSpec>,
    /// Names of the stages added so far.
    names: HashSet<String>,
    notifier: Option<Arc<Notifier>>,
    event_sink: Option<Arc<dyn EventSink>>,
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            names: HashSet::new(),
            notifier: None,
            event_sink: None,
        }
    }

    /// Appends a stage that always runs, with the runner's default containment.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails (duplicate name, blank name).
    pub fn stage(self, runner: Arc<dyn Stage>) -> Result<Self, PipelineValidationError> {
        self.with_stage(StageSpec::from_stage(runner))
    }

    /// Appends a stage specification.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn with_stage(mut self, spec: StageSpec) -> Result<Self, PipelineValidationError> {
        self.add_stage_spec(spec)?;
        Ok(self)
    }

    /// Appends a stage specification.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken or the activation waits on a
    /// stage that is not defined earlier in the pipeline.
    pub fn add_stage_spec(&mut self, spec: StageSpec) -> Result<(), PipelineValidationError> {
        spec.validate()?;

        if self.names.contains(&spec.name) {
            return Err(PipelineValidationError::new(format!(
                "Stage '{}' is defined more than once",
                spec.name
            ))
            .with_stages(vec![spec.name.clone()])
            .with_fix_hint("Give every stage a unique name; activation predicates refer to stages by name."));
        }

        if let Some(dep) = spec.activation.dependency() {
            if !self.names.contains(dep) {
                return Err(PipelineValidationError::new(format!(
                    "Stage '{}' waits on unknown stage '{}'",
                    spec.name, dep
                ))
                .with_stages(vec![spec.name.clone(), dep.to_string()])
                .with_fix_hint("Add the stage it waits on before the stage that waits on it."));
            }
        }

        self.names.insert(spec.name.clone());
        self.stages.push(spec);
        Ok(())
    }

    /// Sets the notifier invoked when the run ends.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Builds the pipeline.
    ///
    /// Without a notifier the run still ends in exactly one (empty) notification.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is blank or the builder has no stages.
    pub fn build(self) -> Result<Pipeline, PipelineValidationError> {
        if self.name.trim().is_empty() {
            return Err(PipelineValidationError::new(
                "Pipeline name cannot be empty or whitespace-only",
            ));
        }
        if self.stages.is_empty() {
            return Err(PipelineValidationError::new("Pipeline has no stages")
                .with_fix_hint("Add at least one stage to the pipeline before building."));
        }

        Ok(Pipeline::new(
            self.name,
            self.stages,
            self.notifier.unwrap_or_default(),
            self.event_sink
                .unwrap_or_else(|| Arc::new(LoggingEventSink::debug())),
        ))
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("name", &self.name)
            .field("stages", &self.stages)
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}
