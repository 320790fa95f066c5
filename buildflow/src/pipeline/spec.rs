//! Stage specifications and activation predicates.

use crate::context::RunContext;
use crate::core::{Containment, RunStatus};
use crate::errors::PipelineValidationError;
use crate::stages::Stage;
use std::fmt;
use std::sync::Arc;

/// Predicate deciding whether a stage runs.
///
/// Predicates only read the run context; they never change it.
#[derive(Clone, Default)]
pub enum Activation {
    /// Always run (default).
    #[default]
    Always,
    /// Run only if the named earlier stage completed.
    AfterSuccess(String),
    /// Run only while the run status is at most the given status.
    WhenStatus(RunStatus),
    /// Run only if a context variable has the given value.
    WhenEnv {
        /// Variable name.
        key: String,
        /// Expected value.
        value: String,
    },
    /// Run if the function returns true.
    Custom(Arc<dyn Fn(&RunContext) -> bool + Send + Sync>),
}

impl Activation {
    /// Creates a predicate from a function.
    #[must_use]
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&RunContext) -> bool + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Creates an environment predicate.
    #[must_use]
    pub fn when_env(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::WhenEnv {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Evaluates the predicate against the run context.
    #[must_use]
    pub fn evaluate(&self, ctx: &RunContext) -> bool {
        match self {
            Self::Always => true,
            Self::AfterSuccess(stage) => ctx.completed(stage),
            Self::WhenStatus(max) => ctx.status() <= *max,
            Self::WhenEnv { key, value } => ctx.env(key) == Some(value.as_str()),
            Self::Custom(f) => f(ctx),
        }
    }

    /// Returns the stage this predicate depends on, if any.
    #[must_use]
    pub fn dependency(&self) -> Option<&str> {
        match self {
            Self::AfterSuccess(stage) => Some(stage.as_str()),
            _ => None,
        }
    }
}

impl fmt::Debug for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => write!(f, "Always"),
            Self::AfterSuccess(stage) => f.debug_tuple("AfterSuccess").field(stage).finish(),
            Self::WhenStatus(max) => f.debug_tuple("WhenStatus").field(max).finish(),
            Self::WhenEnv { key, value } => f
                .debug_struct("WhenEnv")
                .field("key", key)
                .field("value", value)
                .finish(),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => write!(f, "always"),
            Self::AfterSuccess(stage) => write!(f, "after success of '{stage}'"),
            Self::WhenStatus(max) => write!(f, "while status is at most {max}"),
            Self::WhenEnv { key, value } => write!(f, "when {key}={value}"),
            Self::Custom(_) => write!(f, "custom predicate"),
        }
    }
}

/// Specification for a single stage in a pipeline.
#[derive(Debug, Clone)]
pub struct StageSpec {
    /// The unique name of the stage.
    pub name: String,
    /// The stage implementation.
    pub runner: Arc<dyn Stage>,
    /// When the stage runs.
    pub activation: Activation,
    /// What a failure does to the run.
    pub containment: Containment,
}

impl StageSpec {
    /// Creates a new stage specification.
    ///
    /// The containment starts at the runner's default, `Fatal` for most stages.
    #[must_use]
    pub fn new(name: impl Into<String>, runner: Arc<dyn Stage>) -> Self {
        let containment = runner.default_containment();
        Self {
            name: name.into(),
            runner,
            activation: Activation::Always,
            containment,
        }
    }

    /// Creates a specification named after its runner.
    #[must_use]
    pub fn from_stage(runner: Arc<dyn Stage>) -> Self {
        let name = runner.name().to_string();
        Self::new(name, runner)
    }

    /// Sets the activation predicate.
    #[must_use]
    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    /// Runs the stage only after `stage` completed.
    #[must_use]
    pub fn after_success(self, stage: impl Into<String>) -> Self {
        self.with_activation(Activation::AfterSuccess(stage.into()))
    }

    /// Sets the containment policy.
    #[must_use]
    pub fn with_containment(mut self, containment: Containment) -> Self {
        self.containment = containment;
        self
    }

    /// Validates the stage specification.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is blank or the stage waits on itself.
    pub fn validate(&self) -> Result<(), PipelineValidationError> {
        if self.name.trim().is_empty() {
            return Err(PipelineValidationError::new("Stage name cannot be empty or whitespace-only"));
        }
        if self.activation.dependency() == Some(self.name.as_str()) {
            return Err(PipelineValidationError::new(format!(
                "Stage '{}' cannot wait on its own success",
                self.name
            ))
            .with_stages(vec![self.name.clone()]));
        }
        Ok(())
    }
}
