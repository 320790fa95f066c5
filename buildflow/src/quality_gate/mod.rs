//! External quality gate polling.
//!
//! A quality gate is polled until it reaches a final state or a fixed
//! ceiling elapses. Every non-passing outcome, timeout included, is a
//! [`QualityGateError`](crate::errors::QualityGateError).

mod gate;
#[cfg(feature = "http")]
mod sonar;

pub use gate::{wait_for_quality_gate, GateState, QualityGate, StaticQualityGate};
#[cfg(feature = "http")]
pub use sonar::{ReportTask, SonarQualityGate};
