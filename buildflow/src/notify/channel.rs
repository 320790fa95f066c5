//! Notification channel trait.

use super::Message;
use crate::errors::ChannelError;
use async_trait::async_trait;

/// A notification delivery target.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Returns the channel name used in logs and summaries.
    fn name(&self) -> &str;

    /// Delivers a message.
    async fn send(&self, message: &Message) -> Result<(), ChannelError>;
}
