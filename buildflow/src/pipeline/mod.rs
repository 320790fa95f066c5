//! Pipeline building and execution.
//!
//! This module provides:
//! - Stage specifications with activation predicates and containment
//! - Pipeline builder with validation
//! - The sequential runner and its run report
//! - Failure bookkeeping

mod builder;
mod failure_tolerance;
mod runner;
mod spec;

#[cfg(test)]
mod integration_tests;

pub use builder::PipelineBuilder;
pub use failure_tolerance::{FailureCollector, FailureRecord, FailureSummary};
pub use runner::{Pipeline, RunReport};
pub use spec::{Activation, StageSpec};
