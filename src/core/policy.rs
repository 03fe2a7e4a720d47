//! Alert-policy schema, defaults, merge, and validation.
//!
//! [`AlertPolicy`] is the document the uniquenotify daemon reads. Every value
//! handed to callers is complete: partial documents arrive as a
//! [`PolicyOverlay`] and are merged over a base (usually the defaults) with
//! [`AlertPolicy::merge`]. Validation is a separate pure step so callers can
//! decide whether to enforce it before persisting.

#![allow(missing_docs)]

use std::fmt;
use std::sync::LazyLock;

use chrono::NaiveTime;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::coerce;

pub const DEFAULT_THRESHOLD_CPU: i64 = 90;
pub const DEFAULT_COOLDOWN_MINUTES: i64 = 30;
pub const DEFAULT_INTERVAL_SECONDS: i64 = 120;
pub const DEFAULT_MAX_ALERTS_PER_HOUR: i64 = 10;

pub const MIN_THRESHOLD_CPU: i64 = 1;
pub const MAX_THRESHOLD_CPU: i64 = 100;
pub const MIN_COOLDOWN_MINUTES: i64 = 1;
pub const MIN_INTERVAL_SECONDS: i64 = 30;
pub const MIN_ALERTS_PER_HOUR: i64 = 1;

// ──────────────────── documents ────────────────────

/// Telegram bot credentials and destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramChannel {
    /// Whether the daemon should deliver alerts through Telegram.
    pub enabled: bool,
    /// Bot API token. Opaque; persisted exactly as supplied.
    pub bot_token: String,
    /// Destination chat identifier. Opaque.
    pub chat_id: String,
}

impl Default for TelegramChannel {
    fn default() -> Self {
        Self {
            enabled: true,
            bot_token: String::new(),
            chat_id: String::new(),
        }
    }
}

impl TelegramChannel {
    /// Both the token and the chat id are non-blank.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.bot_token.trim().is_empty() && !self.chat_id.trim().is_empty()
    }
}

/// Complete alert policy as persisted on disk.
///
/// Field order matches the on-disk key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertPolicy {
    /// CPU usage percentage that triggers an alert (1–100).
    pub threshold_cpu: i64,
    /// Minutes before the same account may alert again.
    pub cooldown_minutes: i64,
    /// `HH:MM-HH:MM` suppression window, empty when disabled.
    pub quiet_hours: String,
    /// Notification channel.
    pub telegram: TelegramChannel,
    /// Read CPU usage from CloudLinux LVE statistics.
    pub use_cloudlinux: bool,
    /// Sampling interval of the daemon.
    pub interval_seconds: i64,
    /// Global hourly alert budget.
    pub max_alerts_per_hour: i64,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            threshold_cpu: DEFAULT_THRESHOLD_CPU,
            cooldown_minutes: DEFAULT_COOLDOWN_MINUTES,
            quiet_hours: String::new(),
            telegram: TelegramChannel::default(),
            use_cloudlinux: true,
            interval_seconds: DEFAULT_INTERVAL_SECONDS,
            max_alerts_per_hour: DEFAULT_MAX_ALERTS_PER_HOUR,
        }
    }
}

/// Partial channel; absent fields keep the base value on merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramOverlay {
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "coerce::flag")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "coerce::text")]
    pub bot_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "coerce::text")]
    pub chat_id: Option<String>,
}

/// Partial policy as found in a stored or submitted document. Stored values
/// of the wrong JSON type are coerced rather than rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyOverlay {
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "coerce::integer")]
    pub threshold_cpu: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "coerce::integer")]
    pub cooldown_minutes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "coerce::text")]
    pub quiet_hours: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "coerce::channel")]
    pub telegram: Option<TelegramOverlay>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "coerce::flag")]
    pub use_cloudlinux: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "coerce::integer")]
    pub interval_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "coerce::integer")]
    pub max_alerts_per_hour: Option<i64>,
}

impl From<TelegramChannel> for TelegramOverlay {
    fn from(value: TelegramChannel) -> Self {
        Self {
            enabled: Some(value.enabled),
            bot_token: Some(value.bot_token),
            chat_id: Some(value.chat_id),
        }
    }
}

impl From<AlertPolicy> for PolicyOverlay {
    fn from(value: AlertPolicy) -> Self {
        Self {
            threshold_cpu: Some(value.threshold_cpu),
            cooldown_minutes: Some(value.cooldown_minutes),
            quiet_hours: Some(value.quiet_hours),
            telegram: Some(value.telegram.into()),
            use_cloudlinux: Some(value.use_cloudlinux),
            interval_seconds: Some(value.interval_seconds),
            max_alerts_per_hour: Some(value.max_alerts_per_hour),
        }
    }
}

impl TelegramChannel {
    /// Layer `overlay` over this channel.
    #[must_use]
    pub fn merge(&self, overlay: &TelegramOverlay) -> Self {
        Self {
            enabled: overlay.enabled.unwrap_or(self.enabled),
            bot_token: overlay
                .bot_token
                .clone()
                .unwrap_or_else(|| self.bot_token.clone()),
            chat_id: overlay
                .chat_id
                .clone()
                .unwrap_or_else(|| self.chat_id.clone()),
        }
    }
}

impl AlertPolicy {
    /// Canonical default document.
    #[must_use]
    pub fn defaults() -> Self {
        Self::default()
    }

    /// Layer `overlay` over `self`. Present overlay fields win; the nested
    /// channel is merged field by field so the result is always complete.
    #[must_use]
    pub fn merge(&self, overlay: &PolicyOverlay) -> Self {
        Self {
            threshold_cpu: overlay.threshold_cpu.unwrap_or(self.threshold_cpu),
            cooldown_minutes: overlay.cooldown_minutes.unwrap_or(self.cooldown_minutes),
            quiet_hours: overlay
                .quiet_hours
                .clone()
                .unwrap_or_else(|| self.quiet_hours.clone()),
            telegram: overlay
                .telegram
                .as_ref()
                .map_or_else(|| self.telegram.clone(), |t| self.telegram.merge(t)),
            use_cloudlinux: overlay.use_cloudlinux.unwrap_or(self.use_cloudlinux),
            interval_seconds: overlay.interval_seconds.unwrap_or(self.interval_seconds),
            max_alerts_per_hour: overlay
                .max_alerts_per_hour
                .unwrap_or(self.max_alerts_per_hour),
        }
    }

    /// Check every field constraint and return all violations found.
    #[must_use]
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if !(MIN_THRESHOLD_CPU..=MAX_THRESHOLD_CPU).contains(&self.threshold_cpu) {
            errors.push(ValidationError::new(
                PolicyField::ThresholdCpu,
                format!(
                    "must be between {MIN_THRESHOLD_CPU} and {MAX_THRESHOLD_CPU}, got {}",
                    self.threshold_cpu
                ),
            ));
        }
        if self.cooldown_minutes < MIN_COOLDOWN_MINUTES {
            errors.push(ValidationError::new(
                PolicyField::CooldownMinutes,
                format!(
                    "must be at least {MIN_COOLDOWN_MINUTES}, got {}",
                    self.cooldown_minutes
                ),
            ));
        }
        if let Err(reason) = QuietHours::parse(&self.quiet_hours) {
            errors.push(ValidationError::new(PolicyField::QuietHours, reason));
        }
        if self.interval_seconds < MIN_INTERVAL_SECONDS {
            errors.push(ValidationError::new(
                PolicyField::IntervalSeconds,
                format!(
                    "must be at least {MIN_INTERVAL_SECONDS}, got {}",
                    self.interval_seconds
                ),
            ));
        }
        if self.max_alerts_per_hour < MIN_ALERTS_PER_HOUR {
            errors.push(ValidationError::new(
                PolicyField::MaxAlertsPerHour,
                format!(
                    "must be at least {MIN_ALERTS_PER_HOUR}, got {}",
                    self.max_alerts_per_hour
                ),
            ));
        }

        errors
    }

    /// Parsed quiet-hours window, `None` when disabled or malformed.
    #[must_use]
    pub fn quiet_window(&self) -> Option<QuietHours> {
        QuietHours::parse(&self.quiet_hours).ok().flatten()
    }
}

// ──────────────────── validation ────────────────────

/// Policy fields, named by their on-disk keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyField {
    ThresholdCpu,
    CooldownMinutes,
    QuietHours,
    IntervalSeconds,
    MaxAlertsPerHour,
    UseCloudlinux,
    TelegramEnabled,
    BotToken,
    ChatId,
}

impl PolicyField {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ThresholdCpu => "threshold_cpu",
            Self::CooldownMinutes => "cooldown_minutes",
            Self::QuietHours => "quiet_hours",
            Self::IntervalSeconds => "interval_seconds",
            Self::MaxAlertsPerHour => "max_alerts_per_hour",
            Self::UseCloudlinux => "use_cloudlinux",
            Self::TelegramEnabled => "telegram.enabled",
            Self::BotToken => "telegram.bot_token",
            Self::ChatId => "telegram.chat_id",
        }
    }
}

impl fmt::Display for PolicyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One constraint violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub field: PolicyField,
    pub message: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(field: PolicyField, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

// ──────────────────── quiet hours ────────────────────

static QUIET_HOURS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2}):(\d{2})\s*-\s*(\d{1,2}):(\d{2})$").expect("static regex compiles")
});

/// Parsed `HH:MM-HH:MM` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuietHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl QuietHours {
    /// Parse a quiet-hours string. Blank input means "disabled" (`Ok(None)`).
    pub fn parse(raw: &str) -> std::result::Result<Option<Self>, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let caps = QUIET_HOURS_RE
            .captures(trimmed)
            .ok_or_else(|| format!("expected HH:MM-HH:MM, got {trimmed:?}"))?;

        let start = clock_time(&caps[1], &caps[2], "start")?;
        let end = clock_time(&caps[3], &caps[4], "end")?;
        Ok(Some(Self { start, end }))
    }

    /// The window wraps past midnight (e.g. `22:00-06:00`).
    #[must_use]
    pub fn spans_midnight(&self) -> bool {
        self.start > self.end
    }
}

impl fmt::Display for QuietHours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

fn clock_time(hour: &str, minute: &str, label: &str) -> std::result::Result<NaiveTime, String> {
    let h: u32 = hour
        .parse()
        .map_err(|_| format!("{label} hour {hour:?} is not a number"))?;
    let m: u32 = minute
        .parse()
        .map_err(|_| format!("{label} minute {minute:?} is not a number"))?;
    NaiveTime::from_hms_opt(h, m, 0)
        .ok_or_else(|| format!("{label} time {hour}:{minute} is not a valid 24-hour time"))
}
