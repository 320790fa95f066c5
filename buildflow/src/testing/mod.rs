//! Testing utilities for buildflow pipelines.
//!
//! This module provides:
//! - Mock stages that record calls and the status they saw
//! - A scripted tool invoker and a recording notification channel
//! - Assertions over run reports

mod assertions;
mod mocks;

pub use assertions::{
    assert_notified_with, assert_run_status, assert_stage_not_executed, assert_stage_outcome,
};
pub use mocks::{MockStage, RecordingChannel, ScriptedInvoker};
