//! Run status notification.
//!
//! The [`Notifier`] renders one message per run from the final status and
//! fans it out to every configured [`Channel`]. Channel failures are
//! isolated from each other and never touch the run status.

mod channel;
mod mail;
mod message;
mod notifier;
mod webhook;

pub use channel::Channel;
pub use mail::{MailChannel, MailEnvelope, MailTransport, SendmailTransport};
pub use message::{Message, NotificationEvent};
pub use notifier::{NotificationSummary, Notifier};
#[cfg(feature = "http")]
pub use webhook::HttpTransport;
pub use webhook::{Attachment, TempFileTransport, WebhookChannel, WebhookPayload, WebhookTransport};
