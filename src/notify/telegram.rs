//! Telegram Bot API verification sender.

use std::time::Duration;

use chrono::{DateTime, Local};
use reqwest::blocking::Client;
use serde_json::{Value, json};
use tracing::{info, warn};

use super::{DeliveryReceipt, NotificationTester};
use crate::core::errors::{Result, UnError};
use crate::core::policy::TelegramChannel;
use crate::core::settings::TelegramSettings;

/// Telegram verification sender bounded by a request timeout.
///
/// The HTTP client is built per verification, so constructing a tester never
/// fails and never touches TLS or the network.
#[derive(Debug, Clone)]
pub struct TelegramTester {
    api_base: String,
    timeout: Duration,
}

impl TelegramTester {
    /// Tester against `api_base` (e.g. `https://api.telegram.org`).
    #[must_use]
    pub fn new(api_base: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    #[must_use]
    pub fn from_settings(settings: &TelegramSettings) -> Self {
        Self::new(settings.api_base.clone(), settings.timeout())
    }

    fn client(&self) -> Result<Client> {
        Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| UnError::ChannelUnreachable {
                details: format!("cannot build HTTP client: {}", e.without_url()),
            })
    }

    fn endpoint(&self, token: &str) -> String {
        format!("{}/bot{token}/sendMessage", self.api_base)
    }
}

impl NotificationTester for TelegramTester {
    fn test(&self, channel: &TelegramChannel) -> Result<DeliveryReceipt> {
        let token = channel.bot_token.trim();
        let chat_id = channel.chat_id.trim();
        if token.is_empty() || chat_id.is_empty() {
            return Err(UnError::MissingCredentials {
                details: "Bot Token and Chat ID are required for testing.".to_string(),
            });
        }

        let sent_at = Local::now();
        let body = json!({
            "chat_id": chat_id,
            "text": verification_text(sent_at),
        });

        let client = self.client()?;
        info!(chat_id, "sending Telegram verification message");
        let response = client
            .post(self.endpoint(token))
            .json(&body)
            .send()
            .map_err(|e| self.transport_error(&e))?;
        let status = response.status();
        let text = response.text().map_err(|e| self.transport_error(&e))?;

        match interpret_response(&text) {
            Ok(message_id) => {
                info!(chat_id, ?message_id, "Telegram verification delivered");
                Ok(DeliveryReceipt {
                    message_id,
                    sent_at,
                })
            }
            Err(e) => {
                warn!(chat_id, http_status = status.as_u16(), error = %e, "Telegram rejected verification");
                Err(e)
            }
        }
    }
}

impl TelegramTester {
    // The URL embeds the bot token, so it is stripped before formatting.
    fn transport_error(&self, err: &reqwest::Error) -> UnError {
        let reason = if err.is_timeout() {
            format!("request timed out after {}s", self.timeout.as_secs())
        } else {
            let mut detail = err.to_string();
            if let Some(url) = err.url() {
                detail = detail.replace(url.as_str(), "<redacted>");
            }
            detail
        };
        warn!(%reason, "Telegram API unreachable");
        UnError::ChannelUnreachable {
            details: format!(
                "Failed to connect to Telegram API. Please check your Bot Token and network connectivity. ({reason})"
            ),
        }
    }
}

/// Human-readable verification message stamped with `now`.
#[must_use]
pub fn verification_text(now: DateTime<Local>) -> String {
    format!(
        "✅ Unique Notify Test Message\n\nYour Telegram configuration is working correctly!\nTime: {}",
        now.format("%Y-%m-%d %H:%M:%S")
    )
}

/// Interpret a Bot API response body: `ok: true` is success (returning the
/// message id when present); anything else is a rejection.
pub fn interpret_response(body: &str) -> Result<Option<i64>> {
    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    if parsed.get("ok").and_then(Value::as_bool) == Some(true) {
        return Ok(parsed
            .pointer("/result/message_id")
            .and_then(Value::as_i64));
    }
    let description = parsed
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or("Unknown error")
        .to_string();
    Err(UnError::ChannelRejected { description })
}
