//! Notification-channel verification.

pub mod telegram;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::core::errors::Result;
use crate::core::policy::TelegramChannel;

pub use telegram::TelegramTester;

/// Proof that a verification message was accepted by the remote API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReceipt {
    /// Remote message id, when the API reported one.
    pub message_id: Option<i64>,
    /// Local time the request was issued.
    pub sent_at: DateTime<Local>,
}

/// Sends a real verification message through a channel.
///
/// Not a dry run: success means a message reached the destination chat.
pub trait NotificationTester {
    /// Verify `channel` end to end.
    ///
    /// # Errors
    /// `MissingCredentials` before any I/O, `ChannelUnreachable` on transport
    /// failure or timeout, `ChannelRejected` when the API refuses.
    fn test(&self, channel: &TelegramChannel) -> Result<DeliveryReceipt>;
}
