//! Chat webhook channel.
//!
//! The payload is posted either directly over HTTP or, where the host shell
//! cannot safely quote JSON inline, written to a temporary file and posted
//! with `curl --data @file` through the tool invoker.

use super::{Channel, Message};
use crate::config::{WebhookConfig, WebhookTransportKind};
use crate::errors::ChannelError;
use crate::tools::{Platform, ToolCommand, ToolInvoker};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const DEFAULT_POST_TIMEOUT: Duration = Duration::from_secs(30);

/// One coloured block of a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Hex colour of the side bar.
    pub color: String,
    /// Message text.
    pub text: String,
    /// Footer text.
    pub footer: String,
    /// Footer icon URL.
    pub footer_icon: String,
}

/// Body posted to the chat webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// Target chat channel.
    pub channel: String,
    /// Bot display name.
    pub username: String,
    /// Bot icon.
    pub icon: String,
    /// Message blocks.
    pub attachments: Vec<Attachment>,
}

impl WebhookPayload {
    /// Builds the payload for a message, coloured by its status.
    #[must_use]
    pub fn from_message(message: &Message, config: &WebhookConfig) -> Self {
        Self {
            channel: config.channel.clone(),
            username: config.username.clone(),
            icon: config.icon.clone(),
            attachments: vec![Attachment {
                color: message.status.color().to_string(),
                text: message.text.clone(),
                footer: config.footer.clone(),
                footer_icon: config.footer_icon.clone(),
            }],
        }
    }
}

/// Posts a JSON body to a URL.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// Posts `body` and returns the HTTP status code.
    async fn post(&self, url: &str, body: &str) -> Result<u16, String>;
}

/// Transport posting directly with an HTTP client.
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl Default for HttpTransport {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_POST_TIMEOUT)
    }
}

#[cfg(feature = "http")]
impl HttpTransport {
    /// Creates a transport with the default request timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport whose requests give up after `timeout`.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl WebhookTransport for HttpTransport {
    async fn post(&self, url: &str, body: &str) -> Result<u16, String> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| e.to_string())?;
        Ok(response.status().as_u16())
    }
}

/// Transport writing the body to a temporary file and posting it with curl.
pub struct TempFileTransport {
    invoker: Arc<dyn ToolInvoker>,
    max_time: Duration,
}

impl TempFileTransport {
    /// Creates a transport running curl through `invoker`.
    #[must_use]
    pub fn new(invoker: Arc<dyn ToolInvoker>) -> Self {
        Self {
            invoker,
            max_time: DEFAULT_POST_TIMEOUT,
        }
    }

    /// Sets the ceiling passed to curl as `--max-time`.
    #[must_use]
    pub fn with_max_time(mut self, max_time: Duration) -> Self {
        self.max_time = max_time;
        self
    }

    fn curl_line(&self, path: &str, url: &str) -> String {
        let platform = self.invoker.platform();
        let curl = match platform {
            Platform::Posix => "curl",
            Platform::Windows => "curl.exe",
        };
        format!(
            "{curl} -sS --max-time {} -o {} -w \"%{{http_code}}\" -X POST -H \"Content-Type: application/json\" --data {} {}",
            self.max_time.as_secs().max(1),
            null_device(platform),
            quote_arg(platform, &format!("@{path}")),
            quote_arg(platform, url)
        )
    }
}

/// Quotes one argument for the host shell; POSIX single quotes disable all expansion.
fn quote_arg(platform: Platform, value: &str) -> String {
    match platform {
        Platform::Posix => format!("'{}'", value.replace('\'', r"'\''")),
        Platform::Windows => format!("\"{value}\""),
    }
}

fn null_device(platform: Platform) -> &'static str {
    match platform {
        Platform::Posix => "/dev/null",
        Platform::Windows => "NUL",
    }
}

impl std::fmt::Debug for TempFileTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TempFileTransport")
            .field("platform", &self.invoker.platform())
            .finish()
    }
}

#[async_trait]
impl WebhookTransport for TempFileTransport {
    async fn post(&self, url: &str, body: &str) -> Result<u16, String> {
        let mut file = tempfile::Builder::new()
            .prefix("webhook-")
            .suffix(".json")
            .tempfile()
            .map_err(|e| e.to_string())?;
        file.write_all(body.as_bytes()).map_err(|e| e.to_string())?;
        file.flush().map_err(|e| e.to_string())?;

        let path = file.path().display().to_string();
        let command = ToolCommand::new(self.curl_line(&path, url));
        debug!(path = %path, "posting webhook payload from file");

        let output = self
            .invoker
            .invoke(&command)
            .await
            .map_err(|e| e.to_string())?;
        drop(file);

        if !output.is_success() {
            return Err(format!(
                "curl exited with {}: {}",
                output.exit_code,
                output.stderr.trim()
            ));
        }
        output
            .stdout
            .trim()
            .trim_matches('"')
            .parse()
            .map_err(|_| format!("unexpected curl output: {}", output.stdout.trim()))
    }
}

/// Channel posting a coloured attachment to a chat webhook.
pub struct WebhookChannel {
    config: WebhookConfig,
    transport: Arc<dyn WebhookTransport>,
}

impl WebhookChannel {
    /// Creates a channel with an explicit transport.
    #[must_use]
    pub fn new(config: WebhookConfig, transport: Arc<dyn WebhookTransport>) -> Self {
        Self { config, transport }
    }

    /// Creates a channel, picking the transport from configuration.
    ///
    /// `Auto` posts directly on POSIX hosts and goes through a temp file on
    /// Windows hosts, or everywhere when the `http` feature is off. Each post
    /// gives up after `timeout`.
    #[must_use]
    pub fn from_config(config: WebhookConfig, invoker: Arc<dyn ToolInvoker>, timeout: Duration) -> Self {
        let transport = select_transport(config.transport, invoker, timeout);
        Self::new(config, transport)
    }

    /// Returns the channel configuration.
    #[must_use]
    pub fn config(&self) -> &WebhookConfig {
        &self.config
    }
}

#[cfg(feature = "http")]
fn select_transport(
    kind: WebhookTransportKind,
    invoker: Arc<dyn ToolInvoker>,
    timeout: Duration,
) -> Arc<dyn WebhookTransport> {
    match kind {
        WebhookTransportKind::Http => Arc::new(HttpTransport::with_timeout(timeout)),
        WebhookTransportKind::Auto if invoker.platform().is_unix() => Arc::new(HttpTransport::with_timeout(timeout)),
        WebhookTransportKind::TempFile | WebhookTransportKind::Auto => {
            Arc::new(TempFileTransport::new(invoker).with_max_time(timeout))
        }
    }
}

#[cfg(not(feature = "http"))]
fn select_transport(
    _kind: WebhookTransportKind,
    invoker: Arc<dyn ToolInvoker>,
    timeout: Duration,
) -> Arc<dyn WebhookTransport> {
    Arc::new(TempFileTransport::new(invoker).with_max_time(timeout))
}

impl std::fmt::Debug for WebhookChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookChannel")
            .field("channel", &self.config.channel)
            .field("transport", &self.config.transport)
            .finish()
    }
}

#[async_trait]
impl Channel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, message: &Message) -> Result<(), ChannelError> {
        if self.config.url.is_empty() {
            return Err(ChannelError::Misconfigured {
                channel: self.name().to_string(),
                reason: "webhook url is empty".to_string(),
            });
        }

        let payload = WebhookPayload::from_message(message, &self.config);
        let body = serde_json::to_string(&payload).map_err(|e| ChannelError::transport(self.name(), e.to_string()))?;

        let status = self
            .transport
            .post(&self.config.url, &body)
            .await
            .map_err(|reason| ChannelError::transport(self.name(), reason))?;

        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(ChannelError::Rejected {
                channel: self.name().to_string(),
                status,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RunStatus;
    use crate::tools::{MockToolInvoker, ToolOutput};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    struct CapturingTransport {
        status: u16,
        bodies: Mutex<Vec<String>>,
    }

    impl CapturingTransport {
        fn responding(status: u16) -> Arc<Self> {
            Arc::new(Self {
                status,
                bodies: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl WebhookTransport for CapturingTransport {
        async fn post(&self, _url: &str, body: &str) -> Result<u16, String> {
            self.bodies.lock().push(body.to_string());
            Ok(self.status)
        }
    }

    fn config() -> WebhookConfig {
        WebhookConfig {
            url: "https://hooks.example.com/T1".to_string(),
            ..WebhookConfig::default()
        }
    }

    fn message(status: RunStatus) -> Message {
        Message {
            status,
            subject: format!("{status}: app #1"),
            text: "Build text".to_string(),
            html: String::new(),
        }
    }

    #[tokio::test]
    async fn test_payload_shape_and_success_color() {
        let transport = CapturingTransport::responding(200);
        let channel = WebhookChannel::new(config(), transport.clone());

        channel.send(&message(RunStatus::Success)).await.unwrap();

        let body: serde_json::Value = serde_json::from_str(&transport.bodies.lock()[0]).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "channel": "#builds",
                "username": "CI",
                "icon": ":construction_worker:",
                "attachments": [{
                    "color": "#36a64f",
                    "text": "Build text",
                    "footer": "buildflow",
                    "footer_icon": "",
                }],
            })
        );
    }

    #[test]
    fn test_payload_colors_follow_status() {
        let color = |status| WebhookPayload::from_message(&message(status), &config()).attachments[0].color.clone();
        assert_eq!(color(RunStatus::Unstable), "#ff9800");
        assert_eq!(color(RunStatus::Failure), "#d32f2f");
    }

    #[tokio::test]
    async fn test_rejected_status() {
        let channel = WebhookChannel::new(config(), CapturingTransport::responding(404));

        let err = channel.send(&message(RunStatus::Failure)).await.unwrap_err();
        assert_eq!(
            err,
            ChannelError::Rejected {
                channel: "webhook".to_string(),
                status: 404,
            }
        );
    }

    #[tokio::test]
    async fn test_missing_url() {
        let channel = WebhookChannel::new(WebhookConfig::default(), CapturingTransport::responding(200));

        let err = channel.send(&message(RunStatus::Success)).await.unwrap_err();
        assert!(matches!(err, ChannelError::Misconfigured { .. }));
    }

    #[tokio::test]
    async fn test_temp_file_transport_posts_file() {
        let mut invoker = MockToolInvoker::new();
        invoker.expect_platform().return_const(Platform::Windows);
        invoker
            .expect_invoke()
            .withf(|command| {
                command.line.starts_with("curl.exe -sS --max-time 10 -o NUL")
                    && command.line.contains("--data \"@")
                    && command.line.ends_with("\"https://hooks.example.com/T1\"")
            })
            .times(1)
            .returning(|_| Ok(ToolOutput::success("\"200\"")));

        let channel = WebhookChannel::from_config(
            WebhookConfig {
                transport: WebhookTransportKind::TempFile,
                ..config()
            },
            Arc::new(invoker),
            Duration::from_secs(10),
        );

        channel.send(&message(RunStatus::Unstable)).await.unwrap();
    }

    #[tokio::test]
    async fn test_temp_file_transport_curl_failure() {
        let mut invoker = MockToolInvoker::new();
        invoker.expect_platform().return_const(Platform::Posix);
        invoker
            .expect_invoke()
            .returning(|_| Ok(ToolOutput::failure(6, "Could not resolve host")));

        let transport = TempFileTransport::new(Arc::new(invoker));
        let err = transport.post("https://nowhere.invalid", "{}").await.unwrap_err();
        assert!(err.contains("Could not resolve host"));
    }

    #[tokio::test]
    async fn test_posix_curl_line_quotes_url_literally() {
        let mut invoker = MockToolInvoker::new();
        invoker.expect_platform().return_const(Platform::Posix);
        invoker
            .expect_invoke()
            .withf(|command| {
                command.line.starts_with("curl -sS --max-time 30 -o /dev/null")
                    && command.line.contains("--data '@")
                    && command.line.ends_with(r"'https://hooks.example.com/$HOME/`id`/it'\''s'")
            })
            .times(1)
            .returning(|_| Ok(ToolOutput::success("204")));

        let transport = TempFileTransport::new(Arc::new(invoker));
        let status = transport
            .post("https://hooks.example.com/$HOME/`id`/it's", "{}")
            .await
            .unwrap();
        assert_eq!(status, 204);
    }
}
