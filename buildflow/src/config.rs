//! Configuration types for buildflow.
//!
//! Configuration is read from a JSON document and can be overridden from
//! the environment:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `BUILDFLOW_LOG_FORMAT` | `log_format` (`text` or `json`) |
//! | `BUILDFLOW_QUALITY_GATE_TIMEOUT` | `quality_gate.timeout_seconds` |
//! | `BUILDFLOW_NOTIFY_TIMEOUT` | `notify.send_timeout_seconds` |
//! | `BUILDFLOW_WEBHOOK_URL` | `notify.webhook.url` |
//! | `BUILDFLOW_WEBHOOK_CHANNEL` | `notify.webhook.channel` |
//! | `BUILDFLOW_MAIL_RECIPIENTS` | `notify.mail.recipients` (comma separated) |

use crate::errors::ConfigError;
use crate::observability::LogFormat;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildflowConfig {
    /// Log line format.
    #[serde(default)]
    pub log_format: LogFormat,
    /// Quality gate wait settings.
    #[serde(default)]
    pub quality_gate: QualityGateConfig,
    /// Notification channels.
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl BuildflowConfig {
    /// Parses a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Applies overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides through a variable lookup.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("BUILDFLOW_LOG_FORMAT") {
            self.log_format = match value.trim().to_ascii_lowercase().as_str() {
                "text" => LogFormat::Text,
                "json" => LogFormat::Json,
                _ => return Err(invalid_env("BUILDFLOW_LOG_FORMAT", value)),
            };
        }

        if let Some(value) = lookup("BUILDFLOW_QUALITY_GATE_TIMEOUT") {
            self.quality_gate.timeout_seconds = value
                .trim()
                .parse()
                .map_err(|_| invalid_env("BUILDFLOW_QUALITY_GATE_TIMEOUT", value.clone()))?;
        }

        if let Some(value) = lookup("BUILDFLOW_NOTIFY_TIMEOUT") {
            self.notify.send_timeout_seconds = value
                .trim()
                .parse()
                .map_err(|_| invalid_env("BUILDFLOW_NOTIFY_TIMEOUT", value.clone()))?;
        }

        if let Some(url) = lookup("BUILDFLOW_WEBHOOK_URL") {
            self.notify.webhook.get_or_insert_with(WebhookConfig::default).url = url;
        }
        if let Some(channel) = lookup("BUILDFLOW_WEBHOOK_CHANNEL") {
            self.notify.webhook.get_or_insert_with(WebhookConfig::default).channel = channel;
        }

        if let Some(value) = lookup("BUILDFLOW_MAIL_RECIPIENTS") {
            let recipients: Vec<String> = value
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(ToString::to_string)
                .collect();
            self.notify.mail.get_or_insert_with(MailConfig::default).recipients = recipients;
        }

        Ok(self)
    }
}

fn invalid_env(key: &str, value: String) -> ConfigError {
    ConfigError::InvalidEnv {
        key: key.to_string(),
        value,
    }
}

/// Quality gate wait settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityGateConfig {
    /// Ceiling for the whole wait, in seconds.
    #[serde(default = "default_gate_timeout")]
    pub timeout_seconds: u64,
    /// Delay between polls, in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_gate_timeout() -> u64 {
    300
}

fn default_poll_interval() -> u64 {
    5_000
}

impl Default for QualityGateConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_gate_timeout(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl QualityGateConfig {
    /// Gets the ceiling as a `Duration`.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Gets the poll interval as a `Duration`.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Notification channel settings. A channel without settings is disabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Mail channel.
    #[serde(default)]
    pub mail: Option<MailConfig>,
    /// Chat webhook channel.
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
    /// Ceiling for a single channel send, in seconds.
    #[serde(default = "default_send_timeout")]
    pub send_timeout_seconds: u64,
}

fn default_send_timeout() -> u64 {
    30
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            mail: None,
            webhook: None,
            send_timeout_seconds: default_send_timeout(),
        }
    }
}

impl NotifyConfig {
    /// Gets the per-channel send ceiling as a `Duration`.
    #[must_use]
    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_seconds)
    }
}

/// Mail channel settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailConfig {
    /// Recipient addresses.
    #[serde(default)]
    pub recipients: Vec<String>,
    /// Sender address.
    #[serde(default = "default_mail_from")]
    pub from: String,
    /// Path of the sendmail-compatible binary.
    #[serde(default = "default_sendmail")]
    pub sendmail_path: String,
}

fn default_mail_from() -> String {
    "ci@localhost".to_string()
}

fn default_sendmail() -> String {
    "/usr/sbin/sendmail".to_string()
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            recipients: Vec::new(),
            from: default_mail_from(),
            sendmail_path: default_sendmail(),
        }
    }
}

/// How the webhook payload reaches the chat service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookTransportKind {
    /// Direct POST on POSIX hosts, temp file on Windows hosts.
    #[default]
    Auto,
    /// Direct HTTP POST.
    Http,
    /// Write the payload to a temp file and POST it with curl.
    TempFile,
}

/// Chat webhook settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Incoming webhook URL.
    #[serde(default)]
    pub url: String,
    /// Target channel, e.g. `#builds`.
    #[serde(default = "default_channel")]
    pub channel: String,
    /// Display name of the bot.
    #[serde(default = "default_username")]
    pub username: String,
    /// Bot icon, an emoji code or image URL.
    #[serde(default = "default_icon")]
    pub icon: String,
    /// Footer text of the attachment.
    #[serde(default = "default_footer")]
    pub footer: String,
    /// Footer icon URL.
    #[serde(default)]
    pub footer_icon: String,
    /// Delivery transport.
    #[serde(default)]
    pub transport: WebhookTransportKind,
}

fn default_channel() -> String {
    "#builds".to_string()
}

fn default_username() -> String {
    "CI".to_string()
}

fn default_icon() -> String {
    ":construction_worker:".to_string()
}

fn default_footer() -> String {
    "buildflow".to_string()
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            channel: default_channel(),
            username: default_username(),
            icon: default_icon(),
            footer: default_footer(),
            footer_icon: String::new(),
            transport: WebhookTransportKind::default(),
        }
    }
}
