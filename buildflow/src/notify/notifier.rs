//! Fan-out of one message to every configured channel.

use super::{Channel, MailChannel, NotificationEvent, WebhookChannel};
use crate::config::NotifyConfig;
use crate::context::RunContext;
use crate::core::RunStatus;
use crate::errors::{ChannelError, NotifyError};
use crate::events::{EventSink, NoOpEventSink, NOTIFICATION_FAILED, NOTIFICATION_SENT};
use crate::tools::ToolInvoker;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-channel outcome of one notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSummary {
    /// The status that was reported.
    pub status: RunStatus,
    /// Channels that accepted the message.
    pub delivered: Vec<String>,
    /// Channels that failed.
    pub failures: Vec<ChannelError>,
}

impl NotificationSummary {
    /// Creates an empty summary for `status`.
    #[must_use]
    pub fn new(status: RunStatus) -> Self {
        Self {
            status,
            delivered: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Returns the number of channels a delivery was attempted on.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failures.len()
    }

    /// Returns true if no channel failed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Converts channel failures into a [`NotifyError`].
    pub fn into_result(self) -> Result<Self, NotifyError> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(NotifyError {
                attempted: self.attempted(),
                failures: self.failures,
            })
        }
    }
}

/// Sends run notifications to a set of channels.
pub struct Notifier {
    channels: Vec<Arc<dyn Channel>>,
    event_sink: Arc<dyn EventSink>,
    send_timeout: Duration,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    /// Creates a notifier without channels.
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: Vec::new(),
            event_sink: Arc::new(NoOpEventSink),
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Creates a notifier with the channels enabled in `config`.
    #[must_use]
    pub fn from_config(config: &NotifyConfig, invoker: Arc<dyn ToolInvoker>) -> Self {
        let mut notifier = Self::new().with_send_timeout(config.send_timeout());
        if let Some(ref mail) = config.mail {
            notifier = notifier.with_channel(Arc::new(MailChannel::from_config(mail)));
        }
        if let Some(ref webhook) = config.webhook {
            notifier = notifier.with_channel(Arc::new(WebhookChannel::from_config(
                webhook.clone(),
                invoker,
                config.send_timeout(),
            )));
        }
        notifier
    }

    /// Adds a channel.
    #[must_use]
    pub fn with_channel(mut self, channel: Arc<dyn Channel>) -> Self {
        self.channels.push(channel);
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Sets the ceiling for a single channel send.
    #[must_use]
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Returns the channel names.
    #[must_use]
    pub fn channel_names(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.name().to_string()).collect()
    }

    /// Sends the message for `status` on every channel concurrently.
    ///
    /// A failing channel neither stops the others nor raises; failures are
    /// collected in the returned summary. A send that does not finish within
    /// the send timeout is abandoned and counted as a transport failure.
    pub async fn deliver(&self, status: RunStatus, ctx: &RunContext) -> NotificationSummary {
        let event = NotificationEvent::from_context(status, ctx).with_channels(self.channel_names());
        let message = event.render();

        let sends = self.channels.iter().map(|channel| {
            let message = &message;
            let limit = self.send_timeout;
            async move {
                let name = channel.name().to_string();
                let result = match tokio::time::timeout(limit, channel.send(message)).await {
                    Ok(result) => result,
                    Err(_) => Err(ChannelError::transport(
                        &name,
                        format!("no response within {}s", limit.as_secs()),
                    )),
                };
                (name, result)
            }
        });
        let results = join_all(sends).await;

        let mut summary = NotificationSummary::new(status);
        for (name, result) in results {
            match result {
                Ok(()) => {
                    info!(channel = %name, status = %status, "notification sent");
                    self.event_sink.try_emit(
                        NOTIFICATION_SENT,
                        Some(serde_json::json!({"channel": name, "status": status})),
                    );
                    summary.delivered.push(name);
                }
                Err(e) => {
                    warn!(channel = %name, error = %e, "notification failed");
                    self.event_sink.try_emit(
                        NOTIFICATION_FAILED,
                        Some(serde_json::json!({"channel": name, "status": status, "error": e.to_string()})),
                    );
                    summary.failures.push(e);
                }
            }
        }
        summary
    }

    /// Sends the message and reports any channel failure as an error.
    pub async fn notify(&self, status: RunStatus, ctx: &RunContext) -> Result<NotificationSummary, NotifyError> {
        self.deliver(status, ctx).await.into_result()
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("channels", &self.channel_names())
            .field("send_timeout", &self.send_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MailConfig, WebhookConfig};
    use crate::context::BuildIdentity;
    use crate::events::CollectingEventSink;
    use crate::notify::Message;
    use crate::tools::ShellInvoker;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Recorder {
        name: &'static str,
        fail: bool,
        received: Mutex<Vec<Message>>,
    }

    #[async_trait]
    impl Channel for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        async fn send(&self, message: &Message) -> Result<(), ChannelError> {
            self.received.lock().push(message.clone());
            if self.fail {
                Err(ChannelError::transport(self.name, "connection refused"))
            } else {
                Ok(())
            }
        }
    }

    fn ctx() -> RunContext {
        RunContext::new(BuildIdentity::new("app", 7))
    }

    #[tokio::test]
    async fn test_failing_channel_is_isolated() {
        let broken = Arc::new(Recorder {
            name: "mail",
            fail: true,
            ..Default::default()
        });
        let chat = Arc::new(Recorder {
            name: "webhook",
            ..Default::default()
        });
        let sink = Arc::new(CollectingEventSink::new());
        let notifier = Notifier::new()
            .with_channel(broken.clone())
            .with_channel(chat.clone())
            .with_event_sink(sink.clone());

        let summary = notifier.deliver(RunStatus::Unstable, &ctx()).await;

        assert_eq!(summary.delivered, vec!["webhook".to_string()]);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(chat.received.lock()[0].subject, "UNSTABLE: app #7");
        assert_eq!(broken.received.lock().len(), 1);
        assert_eq!(sink.events_of_type(NOTIFICATION_SENT).len(), 1);
        assert_eq!(sink.events_of_type(NOTIFICATION_FAILED).len(), 1);
    }

    #[tokio::test]
    async fn test_notify_error_names_failed_channels() {
        let notifier = Notifier::new().with_channel(Arc::new(Recorder {
            name: "mail",
            fail: true,
            ..Default::default()
        }));

        let err = notifier.notify(RunStatus::Failure, &ctx()).await.unwrap_err();
        assert_eq!(err.attempted, 1);
        assert_eq!(err.failed_channels(), vec!["mail"]);
    }

    #[tokio::test]
    async fn test_no_channels() {
        let summary = Notifier::new().notify(RunStatus::Success, &ctx()).await.unwrap();
        assert_eq!(summary.attempted(), 0);
        assert!(summary.is_complete());
    }

    struct Unanswered;

    #[async_trait]
    impl Channel for Unanswered {
        fn name(&self) -> &str {
            "webhook"
        }

        async fn send(&self, _message: &Message) -> Result<(), ChannelError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_channel_times_out() {
        let mail = Arc::new(Recorder {
            name: "mail",
            ..Default::default()
        });
        let notifier = Notifier::new()
            .with_channel(mail.clone())
            .with_channel(Arc::new(Unanswered))
            .with_send_timeout(Duration::from_secs(5));

        let summary = notifier.deliver(RunStatus::Failure, &ctx()).await;

        assert_eq!(summary.delivered, vec!["mail".to_string()]);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].channel(), "webhook");
        assert!(summary.failures[0].to_string().contains("no response within 5s"));
        assert_eq!(mail.received.lock().len(), 1);
    }

    #[test]
    fn test_from_config() {
        let config = NotifyConfig {
            mail: Some(MailConfig::default()),
            webhook: Some(WebhookConfig::default()),
            send_timeout_seconds: 10,
        };
        let notifier = Notifier::from_config(&config, Arc::new(ShellInvoker::new()));
        assert_eq!(notifier.channel_names(), vec!["mail".to_string(), "webhook".to_string()]);

        assert!(Notifier::from_config(&NotifyConfig::default(), Arc::new(ShellInvoker::new()))
            .channel_names()
            .is_empty());
    }
}
