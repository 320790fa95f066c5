//! # Buildflow
//!
//! An embeddable CI pipeline core.
//!
//! Buildflow runs an ordered sequence of stages (build, test, analysis,
//! quality gate, publish, ...) and reports the outcome once per run:
//!
//! - **Run status**: `SUCCESS < UNSTABLE < FAILURE`, never improving during a run
//! - **Failure containment**: each stage fails as `Fatal`, `Degrade` or `Ignore`
//! - **Activation predicates**: stages run only when their predicate holds,
//!   e.g. after an earlier stage completed
//! - **Notification**: one status-keyed message per run, delivered to every
//!   channel (mail, chat webhook) independently
//! - **Tool invocation**: commands run through a POSIX shell or Windows batch
//!   invoker chosen once per host
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use buildflow::prelude::*;
//!
//! let invoker = platform_invoker();
//! let pipeline = PipelineBuilder::new("payments")
//!     .stage(Arc::new(CommandStage::build_tool("build", invoker.clone(), BuildTool::Maven, "clean package")))?
//!     .with_stage(
//!         StageSpec::from_stage(Arc::new(CommandStage::build_tool("test", invoker, BuildTool::Maven, "test")))
//!             .with_containment(Containment::Degrade),
//!     )?
//!     .with_notifier(Arc::new(Notifier::from_config(&config.notify, platform_invoker())))
//!     .build()?;
//!
//! let report = pipeline.run(RunContext::from_env()).await;
//! println!("{}", report.ci_result());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod notify;
pub mod observability;
pub mod pipeline;
pub mod quality_gate;
pub mod stages;
pub mod testing;
pub mod tools;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{BuildflowConfig, NotifyConfig, QualityGateConfig};
    pub use crate::context::{BuildIdentity, RunContext};
    pub use crate::core::{Containment, RunPhase, RunStatus, StageOutcome, StageRecord};
    pub use crate::errors::{
        BuildflowError, ChannelError, CredentialResolutionError, NotifyError,
        PipelineValidationError, QualityGateError, StageError, ToolInvocationError,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::notify::{Channel, Message, NotificationSummary, Notifier};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{Activation, Pipeline, PipelineBuilder, RunReport, StageSpec};
    pub use crate::quality_gate::{QualityGate, StaticQualityGate};
    pub use crate::stages::{CommandStage, FnStage, NoOpStage, NotifyStage, QualityGateStage, Stage};
    pub use crate::tools::{
        platform_invoker, BuildTool, CredentialProvider, ReportPublisher, ToolCommand, ToolInvoker,
        ToolOutput,
    };
    pub use std::sync::Arc;
}
