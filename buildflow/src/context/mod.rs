//! Run context management.
//!
//! This module provides:
//! - Build identity (job name, build number, build URL) read from the CI host
//! - The mutable run context the runner lends to each stage

mod identity;
mod run;

pub use identity::BuildIdentity;
pub use run::RunContext;
