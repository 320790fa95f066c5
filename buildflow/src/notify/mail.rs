//! Mail channel.

use super::{Channel, Message};
use crate::config::MailConfig;
use crate::errors::ChannelError;
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// A mail ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailEnvelope {
    /// Sender address.
    pub from: String,
    /// Recipient addresses.
    pub to: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html_body: String,
}

impl MailEnvelope {
    /// Formats the envelope as an RFC 5322 message.
    #[must_use]
    pub fn to_rfc822(&self) -> String {
        format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\nMIME-Version: 1.0\r\nContent-Type: text/html; charset=UTF-8\r\n\r\n{}\r\n",
            self.from,
            self.to.join(", "),
            self.subject.replace(['\r', '\n'], " "),
            self.html_body,
        )
    }
}

/// Hands mail to a mail server.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Delivers one mail.
    async fn deliver(&self, envelope: &MailEnvelope) -> Result<(), String>;
}

/// Transport piping mail into a sendmail-compatible binary.
#[derive(Debug, Clone)]
pub struct SendmailTransport {
    path: String,
}

impl SendmailTransport {
    /// Creates a transport using the binary at `path`.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MailTransport for SendmailTransport {
    async fn deliver(&self, envelope: &MailEnvelope) -> Result<(), String> {
        let mut child = tokio::process::Command::new(&self.path)
            .args(["-t", "-oi"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("failed to start {}: {e}", self.path))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(envelope.to_rfc822().as_bytes())
                .await
                .map_err(|e| e.to_string())?;
        }

        let output = child.wait_with_output().await.map_err(|e| e.to_string())?;
        if output.status.success() {
            Ok(())
        } else {
            Err(format!(
                "{} exited with {}: {}",
                self.path,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))
        }
    }
}

/// Channel sending the HTML message to a fixed recipient list.
pub struct MailChannel {
    from: String,
    recipients: Vec<String>,
    transport: Arc<dyn MailTransport>,
}

impl MailChannel {
    /// Creates a mail channel.
    #[must_use]
    pub fn new(from: impl Into<String>, recipients: Vec<String>, transport: Arc<dyn MailTransport>) -> Self {
        Self {
            from: from.into(),
            recipients,
            transport,
        }
    }

    /// Creates a sendmail-backed channel from configuration.
    #[must_use]
    pub fn from_config(config: &MailConfig) -> Self {
        Self::new(
            config.from.clone(),
            config.recipients.clone(),
            Arc::new(SendmailTransport::new(config.sendmail_path.clone())),
        )
    }

    /// Builds the envelope for a message.
    #[must_use]
    pub fn envelope(&self, message: &Message) -> MailEnvelope {
        MailEnvelope {
            from: self.from.clone(),
            to: self.recipients.clone(),
            subject: message.subject.clone(),
            html_body: message.html.clone(),
        }
    }
}

impl std::fmt::Debug for MailChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailChannel")
            .field("from", &self.from)
            .field("recipients", &self.recipients)
            .finish()
    }
}

#[async_trait]
impl Channel for MailChannel {
    fn name(&self) -> &str {
        "mail"
    }

    async fn send(&self, message: &Message) -> Result<(), ChannelError> {
        if self.recipients.is_empty() {
            return Err(ChannelError::Misconfigured {
                channel: self.name().to_string(),
                reason: "no recipients".to_string(),
            });
        }
        self.transport
            .deliver(&self.envelope(message))
            .await
            .map_err(|reason| ChannelError::transport(self.name(), reason))
    }
}
