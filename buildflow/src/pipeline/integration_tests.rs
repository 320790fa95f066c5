//! End-to-end tests for pipeline runs.

#[cfg(test)]
mod tests {
    use crate::config::{QualityGateConfig, WebhookConfig};
    use crate::context::{BuildIdentity, RunContext};
    use crate::core::{Containment, RunPhase, RunStatus, StageOutcome};
    use crate::events::{
        CollectingEventSink, NOTIFICATION_FAILED, NOTIFICATION_SENT, PIPELINE_COMPLETED,
        PIPELINE_STARTED, STAGE_COMPLETED, STAGE_FAILED, STAGE_NOT_RUN, STAGE_SKIPPED,
        STAGE_STARTED,
    };
    use crate::errors::ChannelError;
    use crate::notify::{Channel, Message, Notifier, WebhookChannel, WebhookTransport};
    use crate::pipeline::{Activation, PipelineBuilder, StageSpec};
    use crate::quality_gate::StaticQualityGate;
    use crate::stages::{CommandStage, FnStage, QualityGateStage};
    use crate::testing::{
        assert_notified_with, assert_run_status, assert_stage_not_executed, assert_stage_outcome,
        MockStage, RecordingChannel, ScriptedInvoker,
    };
    use crate::tools::{BuildTool, ToolOutput};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    struct CapturingTransport {
        bodies: Mutex<Vec<serde_json::Value>>,
    }

    #[async_trait]
    impl WebhookTransport for CapturingTransport {
        async fn post(&self, _url: &str, body: &str) -> Result<u16, String> {
            let value = serde_json::from_str(body).map_err(|e| e.to_string())?;
            self.bodies.lock().push(value);
            Ok(200)
        }
    }

    fn ctx() -> RunContext {
        RunContext::new(
            BuildIdentity::new("payments", 12).with_build_url("https://ci.example.com/job/payments/12/"),
        )
    }

    fn spec(stage: &Arc<MockStage>, containment: Containment) -> StageSpec {
        StageSpec::from_stage(stage.clone()).with_containment(containment)
    }

    fn notifier_with(channel: &Arc<RecordingChannel>) -> Arc<Notifier> {
        Arc::new(Notifier::new().with_channel(channel.clone()))
    }

    #[tokio::test]
    async fn test_all_stages_succeed() {
        let transport = Arc::new(CapturingTransport {
            bodies: Mutex::new(Vec::new()),
        });
        let webhook = WebhookChannel::new(
            WebhookConfig {
                url: "https://hooks.example.com/T1".to_string(),
                ..WebhookConfig::default()
            },
            transport.clone(),
        );
        let build = Arc::new(MockStage::new("build"));
        let test = Arc::new(MockStage::new("test"));

        let pipeline = PipelineBuilder::new("ci")
            .with_stage(spec(&build, Containment::Fatal))
            .unwrap()
            .with_stage(spec(&test, Containment::Degrade))
            .unwrap()
            .with_notifier(Arc::new(Notifier::new().with_channel(Arc::new(webhook))))
            .build()
            .unwrap();

        let report = pipeline.run(ctx()).await;

        assert_run_status(&report, RunStatus::Success);
        assert_eq!(report.ci_result(), "SUCCESS");
        assert_eq!(report.context.phase(), RunPhase::Finished(RunStatus::Success));
        assert!(report.context.completed("build"));
        assert!(report.context.completed("test"));

        let bodies = transport.bodies.lock();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["attachments"][0]["color"], "#36a64f");
    }

    #[tokio::test]
    async fn test_degrade_failure_makes_run_unstable() {
        let channel = Arc::new(RecordingChannel::new("chat"));
        let test = Arc::new(MockStage::failing("test", "3 tests failed"));
        let package = Arc::new(MockStage::new("package"));

        let report = PipelineBuilder::new("ci")
            .with_stage(spec(&test, Containment::Degrade))
            .unwrap()
            .with_stage(spec(&package, Containment::Fatal))
            .unwrap()
            .with_notifier(notifier_with(&channel))
            .build()
            .unwrap()
            .run(ctx())
            .await;

        assert_run_status(&report, RunStatus::Unstable);
        assert_stage_outcome(&report, "test", StageOutcome::Failed);
        assert_stage_outcome(&report, "package", StageOutcome::Passed);
        assert_eq!(report.context.flag("test"), Some(false));
        assert_eq!(channel.statuses(), vec![RunStatus::Unstable]);
        assert_eq!(report.failures.failures[0].containment, Containment::Degrade);
        assert_eq!(report.failures.failures[0].context["run_status"], "UNSTABLE");
    }

    #[tokio::test]
    async fn test_fatal_failure_aborts_remaining_stages() {
        let channel = Arc::new(RecordingChannel::new("mail"));
        let build = Arc::new(MockStage::failing("build", "compilation error"));
        let deploy = Arc::new(MockStage::new("deploy"));

        let report = PipelineBuilder::new("ci")
            .with_stage(spec(&build, Containment::Fatal))
            .unwrap()
            .with_stage(spec(&deploy, Containment::Fatal))
            .unwrap()
            .with_notifier(notifier_with(&channel))
            .build()
            .unwrap()
            .run(ctx())
            .await;

        assert_run_status(&report, RunStatus::Failure);
        assert_notified_with(&report, RunStatus::Failure);
        assert!(!deploy.was_called());
        assert_stage_not_executed(&report, "deploy");
        assert_stage_outcome(&report, "deploy", StageOutcome::NotRun);
        assert_eq!(report.failures.not_run_stages(), 1);
        assert_eq!(channel.send_count(), 1);
        assert_eq!(channel.subjects(), vec!["FAILURE: payments #12".to_string()]);
    }

    #[tokio::test]
    async fn test_ignore_failure_leaves_status_unchanged() {
        let lint = Arc::new(MockStage::failing("lint", "style warnings"));
        let build = Arc::new(MockStage::new("build"));

        let report = PipelineBuilder::new("ci")
            .with_stage(spec(&lint, Containment::Ignore))
            .unwrap()
            .with_stage(spec(&build, Containment::Fatal))
            .unwrap()
            .build()
            .unwrap()
            .run(ctx())
            .await;

        assert_run_status(&report, RunStatus::Success);
        assert_stage_outcome(&report, "lint", StageOutcome::Failed);
        assert_eq!(report.context.flag("lint"), Some(false));
        assert!(build.was_called());
        assert!(report.failures.has_failures());
    }

    #[tokio::test]
    async fn test_status_never_improves() {
        let analysis = Arc::new(MockStage::failing("analysis", "sonar unreachable"));
        let docs = Arc::new(MockStage::new("docs"));
        let lint = Arc::new(MockStage::failing("lint", "warnings"));
        let publish = Arc::new(MockStage::failing("publish", "401"));
        let probe = Arc::new(MockStage::new("probe"));

        let report = PipelineBuilder::new("ci")
            .with_stage(spec(&analysis, Containment::Degrade))
            .unwrap()
            .with_stage(spec(&docs, Containment::Fatal))
            .unwrap()
            .with_stage(spec(&lint, Containment::Ignore))
            .unwrap()
            .with_stage(spec(&publish, Containment::Fatal))
            .unwrap()
            .with_stage(spec(&probe, Containment::Fatal))
            .unwrap()
            .build()
            .unwrap()
            .run(ctx())
            .await;

        assert_eq!(docs.observed_statuses(), vec![RunStatus::Unstable]);
        assert_eq!(lint.observed_statuses(), vec![RunStatus::Unstable]);
        assert_eq!(publish.observed_statuses(), vec![RunStatus::Unstable]);
        assert!(!probe.was_called());
        assert_run_status(&report, RunStatus::Failure);
    }

    #[tokio::test]
    async fn test_quality_gate_skipped_when_analysis_failed() {
        let channel = Arc::new(RecordingChannel::new("chat"));
        let test = Arc::new(MockStage::new("test"));
        let analysis = Arc::new(MockStage::failing("analysis", "scanner crashed"));
        let gate = Arc::new(MockStage::new("quality-gate"));

        let report = PipelineBuilder::new("ci")
            .with_stage(spec(&test, Containment::Degrade))
            .unwrap()
            .with_stage(spec(&analysis, Containment::Degrade))
            .unwrap()
            .with_stage(spec(&gate, Containment::Degrade).after_success("analysis"))
            .unwrap()
            .with_notifier(notifier_with(&channel))
            .build()
            .unwrap()
            .run(ctx())
            .await;

        assert_stage_outcome(&report, "quality-gate", StageOutcome::Skipped);
        assert!(!gate.was_called());
        assert_run_status(&report, RunStatus::Unstable);
        assert_eq!(report.failures.skipped_stages, 1);
        assert_eq!(report.failures.failed_stages, 1);
        assert_eq!(channel.statuses(), vec![RunStatus::Unstable]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quality_gate_timeout_degrades_run() {
        let gate = QualityGateStage::new(
            "quality-gate",
            Arc::new(StaticQualityGate::pending("payments")),
            QualityGateConfig {
                timeout_seconds: 300,
                poll_interval_ms: 5_000,
            },
        );
        let deploy = Arc::new(MockStage::new("deploy"));

        let report = PipelineBuilder::new("ci")
            .stage(Arc::new(gate))
            .unwrap()
            .with_stage(spec(&deploy, Containment::Fatal))
            .unwrap()
            .build()
            .unwrap()
            .run(ctx())
            .await;

        assert_run_status(&report, RunStatus::Unstable);
        assert_eq!(report.failures.failures[0].error_type, "QualityGateError");
        assert!(deploy.was_called());
    }

    #[tokio::test]
    async fn test_channel_failure_is_isolated_from_status() {
        let broken = Arc::new(RecordingChannel::failing("mail"));
        let chat = Arc::new(RecordingChannel::new("chat"));
        let sink = Arc::new(CollectingEventSink::new());

        let report = PipelineBuilder::new("ci")
            .stage(Arc::new(MockStage::new("build")))
            .unwrap()
            .with_notifier(Arc::new(
                Notifier::new()
                    .with_channel(broken.clone())
                    .with_channel(chat.clone())
                    .with_event_sink(sink.clone()),
            ))
            .build()
            .unwrap()
            .run(ctx())
            .await;

        assert_run_status(&report, RunStatus::Success);
        assert_eq!(broken.send_count(), 1);
        assert_eq!(chat.send_count(), 1);
        assert_eq!(report.notification.delivered, vec!["chat".to_string()]);
        assert_eq!(report.notification.failures.len(), 1);
        assert_eq!(sink.events_of_type(NOTIFICATION_SENT).len(), 1);
        assert_eq!(sink.events_of_type(NOTIFICATION_FAILED).len(), 1);
    }

    struct SilentWebhook;

    #[async_trait]
    impl Channel for SilentWebhook {
        fn name(&self) -> &str {
            "webhook"
        }

        async fn send(&self, _message: &Message) -> Result<(), ChannelError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_channel_does_not_hold_up_run() {
        let mail = Arc::new(RecordingChannel::new("mail"));
        let test = Arc::new(MockStage::failing("test", "2 tests failed"));

        let report = PipelineBuilder::new("ci")
            .stage(Arc::new(MockStage::new("build")))
            .unwrap()
            .with_stage(spec(&test, Containment::Degrade))
            .unwrap()
            .with_notifier(Arc::new(
                Notifier::new()
                    .with_channel(mail.clone())
                    .with_channel(Arc::new(SilentWebhook))
                    .with_send_timeout(Duration::from_secs(10)),
            ))
            .build()
            .unwrap()
            .run(ctx())
            .await;

        assert_run_status(&report, RunStatus::Unstable);
        assert_notified_with(&report, RunStatus::Unstable);
        assert_eq!(mail.statuses(), vec![RunStatus::Unstable]);
        assert_eq!(report.notification.delivered, vec!["mail".to_string()]);
        assert_eq!(report.notification.failures[0].channel(), "webhook");
    }

    #[tokio::test]
    async fn test_events_follow_run() {
        let sink = Arc::new(CollectingEventSink::new());

        PipelineBuilder::new("ci")
            .stage(Arc::new(MockStage::new("checkout")))
            .unwrap()
            .with_stage(
                StageSpec::from_stage(Arc::new(MockStage::new("deploy")))
                    .with_activation(Activation::when_env("BRANCH", "main")),
            )
            .unwrap()
            .stage(Arc::new(MockStage::failing("build", "boom")))
            .unwrap()
            .stage(Arc::new(MockStage::new("archive")))
            .unwrap()
            .with_event_sink(sink.clone())
            .build()
            .unwrap()
            .run(ctx())
            .await;

        assert_eq!(
            sink.event_types(),
            vec![
                PIPELINE_STARTED,
                STAGE_STARTED,
                STAGE_COMPLETED,
                STAGE_SKIPPED,
                STAGE_STARTED,
                STAGE_FAILED,
                STAGE_NOT_RUN,
                PIPELINE_COMPLETED,
            ]
        );
    }

    #[tokio::test]
    async fn test_command_stages_link_reports_in_notification() {
        let channel = Arc::new(RecordingChannel::new("mail"));
        let invoker = Arc::new(
            ScriptedInvoker::default().respond("mvn -B test", ToolOutput::failure(1, "Tests run: 10, Failures: 2")),
        );

        let report = PipelineBuilder::new("ci")
            .stage(Arc::new(CommandStage::build_tool(
                "build",
                invoker.clone(),
                BuildTool::Maven,
                "clean package -DskipTests",
            )))
            .unwrap()
            .with_stage(
                StageSpec::from_stage(Arc::new(
                    CommandStage::build_tool("test", invoker.clone(), BuildTool::Maven, "test")
                        .with_report(BuildTool::Maven.test_report())
                        .with_report(BuildTool::Maven.coverage_report()),
                ))
                .with_containment(Containment::Degrade),
            )
            .unwrap()
            .stage(Arc::new(FnStage::new("version", |ctx: &mut RunContext| {
                ctx.set_env("VERSION", "1.0.12");
                Ok(())
            })))
            .unwrap()
            .with_notifier(notifier_with(&channel))
            .build()
            .unwrap()
            .run(ctx())
            .await;

        assert_run_status(&report, RunStatus::Unstable);
        assert_eq!(
            invoker.invocations(),
            vec!["mvn -B clean package -DskipTests".to_string(), "mvn -B test".to_string()]
        );
        assert_eq!(report.context.env("VERSION"), Some("1.0.12"));

        let message = &channel.messages()[0];
        assert!(message.text.starts_with("Build unstable: payments #12"));
        assert!(message
            .text
            .contains("Tests report: https://ci.example.com/job/payments/12/testReport/"));
        assert!(message
            .text
            .contains("Coverage report: https://ci.example.com/job/payments/12/jacoco/"));
    }

    #[tokio::test]
    async fn test_report_serializes_without_context() {
        let report = PipelineBuilder::new("ci")
            .stage(Arc::new(MockStage::new("build")))
            .unwrap()
            .build()
            .unwrap()
            .run(ctx())
            .await;

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "SUCCESS");
        assert_eq!(json["stages"][0]["outcome"], "passed");
        assert!(json.get("context").is_none());
    }
}
