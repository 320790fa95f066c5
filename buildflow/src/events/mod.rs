//! Event sink system for run observability.
//!
//! The runner and notifier report lifecycle events (`pipeline.started`,
//! `stage.failed`, `notification.sent`, ...) through an [`EventSink`].

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Run started.
pub const PIPELINE_STARTED: &str = "pipeline.started";
/// Run reached its terminal status.
pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
/// Stage body is about to run.
pub const STAGE_STARTED: &str = "stage.started";
/// Stage body completed.
pub const STAGE_COMPLETED: &str = "stage.completed";
/// Stage body failed.
pub const STAGE_FAILED: &str = "stage.failed";
/// Activation predicate evaluated false.
pub const STAGE_SKIPPED: &str = "stage.skipped";
/// Run aborted before the stage was reached.
pub const STAGE_NOT_RUN: &str = "stage.not_run";
/// A channel accepted the notification.
pub const NOTIFICATION_SENT: &str = "notification.sent";
/// A channel failed to deliver the notification.
pub const NOTIFICATION_FAILED: &str = "notification.failed";
