//! Sequential pipeline execution with failure containment.

use super::{FailureCollector, FailureRecord, FailureSummary, StageSpec};
use crate::context::RunContext;
use crate::core::{Containment, RunStatus, StageOutcome, StageRecord};
use crate::events::{
    EventSink, PIPELINE_COMPLETED, PIPELINE_STARTED, STAGE_COMPLETED, STAGE_FAILED, STAGE_NOT_RUN,
    STAGE_SKIPPED, STAGE_STARTED,
};
use crate::notify::{NotificationSummary, Notifier};
use crate::observability::{SpanTimer, StageSpanAttributes};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of one pipeline run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    /// The pipeline name.
    pub pipeline: String,
    /// The final run status.
    pub status: RunStatus,
    /// One record per declared stage, in declaration order.
    pub stages: Vec<StageRecord>,
    /// Failures recorded during the run.
    pub failures: FailureSummary,
    /// Outcome of the end-of-run notification.
    pub notification: NotificationSummary,
    /// The context as the run left it.
    #[serde(skip)]
    pub context: RunContext,
}

impl RunReport {
    /// Returns the record of a stage.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageRecord> {
        self.stages.iter().find(|r| r.name == name)
    }

    /// Returns the outcome of a stage.
    #[must_use]
    pub fn outcome(&self, name: &str) -> Option<StageOutcome> {
        self.stage(name).map(|r| r.outcome)
    }

    /// Returns the names of the stages whose body ran.
    #[must_use]
    pub fn executed(&self) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|r| r.outcome.was_executed())
            .map(|r| r.name.as_str())
            .collect()
    }

    /// Returns the CI result name of the final status.
    #[must_use]
    pub fn ci_result(&self) -> &'static str {
        self.status.as_ci_result()
    }
}

/// A validated, ordered sequence of stages.
///
/// Built with [`PipelineBuilder`](super::PipelineBuilder).
pub struct Pipeline {
    name: String,
    stages: Vec<StageSpec>,
    notifier: Arc<Notifier>,
    event_sink: Arc<dyn EventSink>,
}

impl Pipeline {
    pub(crate) fn new(
        name: String,
        stages: Vec<StageSpec>,
        notifier: Arc<Notifier>,
        event_sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            name,
            stages,
            notifier,
            event_sink,
        }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stage names in run order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// Runs every stage in order and notifies once with the final status.
    ///
    /// A stage whose activation is false is skipped. A failed stage sets its
    /// completed flag to false and is contained by its policy: `Fatal` fails
    /// the run and leaves the remaining stages not run, `Degrade` marks the
    /// run unstable, `Ignore` changes nothing. Notification problems are
    /// logged and never change the status.
    pub async fn run(&self, mut ctx: RunContext) -> RunReport {
        ctx.mark_running();
        info!(
            pipeline = %self.name,
            job = %ctx.job_name(),
            build = ctx.build_number(),
            stages = self.stages.len(),
            "pipeline started"
        );
        self.event_sink.try_emit(
            PIPELINE_STARTED,
            Some(serde_json::json!({
                "pipeline": self.name,
                "run_id": ctx.identity().run_id.to_string(),
                "job_name": ctx.job_name(),
                "build_number": ctx.build_number(),
                "stages": self.stage_names(),
            })),
        );

        let mut collector = FailureCollector::new();
        let mut records = Vec::with_capacity(self.stages.len());

        for spec in &self.stages {
            if collector.should_stop() {
                debug!(stage = %spec.name, "stage not run");
                self.event_sink.try_emit(
                    STAGE_NOT_RUN,
                    Some(serde_json::json!({"stage": spec.name})),
                );
                records.push(StageRecord::untouched(&spec.name, spec.containment, StageOutcome::NotRun));
                continue;
            }

            if !spec.activation.evaluate(&ctx) {
                info!(stage = %spec.name, activation = %spec.activation, "stage skipped");
                self.event_sink.try_emit(
                    STAGE_SKIPPED,
                    Some(serde_json::json!({"stage": spec.name, "activation": spec.activation.to_string()})),
                );
                collector.record_skip(&spec.name);
                records.push(StageRecord::untouched(&spec.name, spec.containment, StageOutcome::Skipped));
                continue;
            }

            records.push(self.run_stage(spec, &mut ctx, &mut collector).await);
        }

        let status = ctx.status();
        ctx.mark_finished();
        let failures = collector.summary(self.stages.len());

        let notification = self.notifier.deliver(status, &ctx).await;
        if let Err(e) = notification.clone().into_result() {
            warn!(pipeline = %self.name, error = %e, "run notification incomplete");
        }

        info!(
            pipeline = %self.name,
            status = %status,
            failed = failures.failed_stages,
            elapsed_ms = ctx.elapsed().num_milliseconds(),
            "pipeline completed"
        );
        self.event_sink.try_emit(
            PIPELINE_COMPLETED,
            Some(serde_json::json!({
                "pipeline": self.name,
                "status": status,
                "failures": failures.to_dict(),
                "notified": notification.delivered,
            })),
        );

        RunReport {
            pipeline: self.name.clone(),
            status,
            stages: records,
            failures,
            notification,
            context: ctx,
        }
    }

    async fn run_stage(
        &self,
        spec: &StageSpec,
        ctx: &mut RunContext,
        collector: &mut FailureCollector,
    ) -> StageRecord {
        let attributes = StageSpanAttributes::new(&spec.name).with_containment(spec.containment.to_string());
        self.event_sink
            .try_emit(STAGE_STARTED, Some(attributes.to_event_data()));
        debug!(stage = %spec.name, containment = %spec.containment, "stage started");

        let timer = SpanTimer::start(&spec.name);
        let result = spec.runner.execute(ctx).await;
        let duration_ms = timer.finish();

        match result {
            Ok(()) => {
                ctx.set_flag(&spec.name, true);
                collector.record_completion(&spec.name);
                info!(stage = %spec.name, duration_ms, "stage completed");
                self.event_sink.try_emit(
                    STAGE_COMPLETED,
                    Some(
                        attributes
                            .with_outcome(StageOutcome::Passed.to_string())
                            .with_duration_ms(duration_ms)
                            .to_event_data(),
                    ),
                );
                StageRecord::passed(&spec.name, spec.containment, duration_ms)
            }
            Err(err) => {
                ctx.set_flag(&spec.name, false);
                if let Some(status) = spec.containment.failure_status() {
                    ctx.degrade(status);
                }

                let message = err.to_string();
                match spec.containment {
                    Containment::Fatal => {
                        error!(stage = %spec.name, error = %message, "stage failed, aborting run");
                    }
                    Containment::Degrade => {
                        warn!(stage = %spec.name, error = %message, "stage failed, run is unstable");
                    }
                    Containment::Ignore => {
                        info!(stage = %spec.name, error = %message, "stage failed, ignored");
                    }
                }

                collector.record_failure(
                    FailureRecord::from_error(&err, spec.containment)
                        .with_context("duration_ms", serde_json::json!(duration_ms))
                        .with_context("run_status", serde_json::json!(ctx.status())),
                );
                self.event_sink.try_emit(
                    STAGE_FAILED,
                    Some(
                        attributes
                            .with_outcome(StageOutcome::Failed.to_string())
                            .with_duration_ms(duration_ms)
                            .with_error(message.clone())
                            .to_event_data(),
                    ),
                );
                StageRecord::failed(&spec.name, spec.containment, duration_ms, message)
            }
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("stages", &self.stages)
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}
