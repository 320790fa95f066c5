//! Core domain model types for buildflow.
//!
//! This module contains the fundamental types shared by the runner,
//! stages and notifier:
//! - Run status with its severity ordering
//! - Run lifecycle phase
//! - Stage containment policy and per-stage outcomes

mod record;
mod status;

pub use record::StageRecord;
pub use status::{Containment, RunPhase, RunStatus, StageOutcome};
