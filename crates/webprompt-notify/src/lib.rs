//! Notification channels: forward response text to an external chat.

pub mod telegram;

use async_trait::async_trait;
use webprompt_core::Result;

pub use telegram::TelegramChannel;

/// Best-effort delivery of a message to one configured target.
///
/// Failures are reported as `Error::Notification` and never retried.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &'static str;

    async fn notify(&self, message: &str) -> Result<()>;
}
