//! Operator form input and its explicit parse step.
//!
//! Form values arrive as text. [`PolicyForm::parse`] turns them into a typed
//! [`AlertPolicy`]; in [`ParseMode::Strict`] non-integer text is an error, in
//! [`ParseMode::Lenient`] it is coerced C-style (`"12abc"` → 12, `"abc"` → 0)
//! and left for validation to reject.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, UnError};
use crate::core::policy::{
    AlertPolicy, DEFAULT_COOLDOWN_MINUTES, DEFAULT_INTERVAL_SECONDS, DEFAULT_MAX_ALERTS_PER_HOUR,
    DEFAULT_THRESHOLD_CPU, PolicyField, TelegramChannel,
};

/// How numeric text is turned into integers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// Reject anything that is not an integer.
    #[default]
    Strict,
    /// Coerce the leading integer, falling back to 0.
    Lenient,
}

impl std::str::FromStr for ParseMode {
    type Err = UnError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            other => Err(UnError::InvalidSettings {
                details: format!("unknown parse mode {other:?} (expected strict or lenient)"),
            }),
        }
    }
}

/// Raw operator input. Checkbox fields are `false` when the box was absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyForm {
    pub threshold_cpu: Option<String>,
    pub cooldown_minutes: Option<String>,
    pub quiet_hours: Option<String>,
    pub telegram_enabled: bool,
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub use_cloudlinux: bool,
    pub interval_seconds: Option<String>,
    pub max_alerts_per_hour: Option<String>,
}

impl PolicyForm {
    /// Pre-fill a form with the values of an existing policy.
    #[must_use]
    pub fn from_policy(policy: &AlertPolicy) -> Self {
        Self {
            threshold_cpu: Some(policy.threshold_cpu.to_string()),
            cooldown_minutes: Some(policy.cooldown_minutes.to_string()),
            quiet_hours: Some(policy.quiet_hours.clone()),
            telegram_enabled: policy.telegram.enabled,
            bot_token: Some(policy.telegram.bot_token.clone()),
            chat_id: Some(policy.telegram.chat_id.clone()),
            use_cloudlinux: policy.use_cloudlinux,
            interval_seconds: Some(policy.interval_seconds.to_string()),
            max_alerts_per_hour: Some(policy.max_alerts_per_hour.to_string()),
        }
    }

    /// Build a complete policy from the form.
    ///
    /// Absent numeric fields take their default; text fields are trimmed.
    /// In strict mode every malformed field is reported in one error.
    pub fn parse(&self, mode: ParseMode) -> Result<AlertPolicy> {
        let mut problems = Vec::new();
        let mut int_field = |field: PolicyField, raw: Option<&String>, default: i64| {
            let Some(raw) = raw else {
                return default;
            };
            match mode {
                ParseMode::Lenient => lenient_int(raw),
                ParseMode::Strict => raw.trim().parse::<i64>().unwrap_or_else(|_| {
                    problems.push(format!("{field}: expected an integer, got {raw:?}"));
                    0
                }),
            }
        };

        let threshold_cpu = int_field(
            PolicyField::ThresholdCpu,
            self.threshold_cpu.as_ref(),
            DEFAULT_THRESHOLD_CPU,
        );
        let cooldown_minutes = int_field(
            PolicyField::CooldownMinutes,
            self.cooldown_minutes.as_ref(),
            DEFAULT_COOLDOWN_MINUTES,
        );
        let interval_seconds = int_field(
            PolicyField::IntervalSeconds,
            self.interval_seconds.as_ref(),
            DEFAULT_INTERVAL_SECONDS,
        );
        let max_alerts_per_hour = int_field(
            PolicyField::MaxAlertsPerHour,
            self.max_alerts_per_hour.as_ref(),
            DEFAULT_MAX_ALERTS_PER_HOUR,
        );

        if !problems.is_empty() {
            return Err(UnError::InvalidInput {
                details: problems.join("; "),
            });
        }

        Ok(AlertPolicy {
            threshold_cpu,
            cooldown_minutes,
            quiet_hours: trimmed(self.quiet_hours.as_ref()),
            telegram: TelegramChannel {
                enabled: self.telegram_enabled,
                bot_token: trimmed(self.bot_token.as_ref()),
                chat_id: trimmed(self.chat_id.as_ref()),
            },
            use_cloudlinux: self.use_cloudlinux,
            interval_seconds,
            max_alerts_per_hour,
        })
    }
}

fn trimmed(value: Option<&String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

/// C-style integer coercion: optional leading whitespace and sign, then the
/// longest run of digits. Anything else yields 0; overflow saturates.
#[must_use]
pub fn lenient_int(raw: &str) -> i64 {
    let s = raw.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let run: &str = &digits[..digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len())];
    if run.is_empty() {
        return 0;
    }
    let magnitude = run.parse::<i64>().unwrap_or(i64::MAX);
    if negative { -magnitude } else { magnitude }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(threshold: &str) -> PolicyForm {
        PolicyForm {
            threshold_cpu: Some(threshold.to_string()),
            telegram_enabled: true,
            use_cloudlinux: true,
            ..PolicyForm::default()
        }
    }

    #[test]
    fn lenient_int_mimics_c_style_coercion() {
        assert_eq!(lenient_int("95"), 95);
        assert_eq!(lenient_int("  42  "), 42);
        assert_eq!(lenient_int("12abc"), 12);
        assert_eq!(lenient_int("abc"), 0);
        assert_eq!(lenient_int(""), 0);
        assert_eq!(lenient_int("-7"), -7);
        assert_eq!(lenient_int("+8"), 8);
        assert_eq!(lenient_int("3.9"), 3);
        assert_eq!(lenient_int("99999999999999999999"), i64::MAX);
    }

    #[test]
    fn strict_mode_rejects_non_numeric_text() {
        let err = form("ninety").parse(ParseMode::Strict).unwrap_err();
        assert_eq!(err.code(), "UN-1005");
        assert!(err.to_string().contains("threshold_cpu"));
    }

    #[test]
    fn strict_mode_reports_every_bad_field() {
        let input = PolicyForm {
            threshold_cpu: Some("x".into()),
            interval_seconds: Some("y".into()),
            ..PolicyForm::default()
        };
        let text = input.parse(ParseMode::Strict).unwrap_err().to_string();
        assert!(text.contains("threshold_cpu"));
        assert!(text.contains("interval_seconds"));
    }

    #[test]
    fn lenient_mode_coerces_to_zero_and_validation_catches_it() {
        let policy = form("ninety").parse(ParseMode::Lenient).unwrap();
        assert_eq!(policy.threshold_cpu, 0);
        assert!(!policy.validate().is_empty());
    }

    #[test]
    fn absent_numeric_fields_take_defaults() {
        let policy = PolicyForm::default().parse(ParseMode::Strict).unwrap();
        assert_eq!(policy.threshold_cpu, DEFAULT_THRESHOLD_CPU);
        assert_eq!(policy.cooldown_minutes, DEFAULT_COOLDOWN_MINUTES);
        assert_eq!(policy.interval_seconds, DEFAULT_INTERVAL_SECONDS);
        assert_eq!(policy.max_alerts_per_hour, DEFAULT_MAX_ALERTS_PER_HOUR);
    }

    #[test]
    fn unchecked_boxes_mean_false() {
        let policy = PolicyForm::default().parse(ParseMode::Strict).unwrap();
        assert!(!policy.telegram.enabled);
        assert!(!policy.use_cloudlinux);
    }

    #[test]
    fn text_fields_are_trimmed() {
        let input = PolicyForm {
            quiet_hours: Some(" 22:00-06:00 ".into()),
            bot_token: Some(" 123:abc\n".into()),
            chat_id: Some("\t-1001 ".into()),
            ..PolicyForm::default()
        };
        let policy = input.parse(ParseMode::Strict).unwrap();
        assert_eq!(policy.quiet_hours, "22:00-06:00");
        assert_eq!(policy.telegram.bot_token, "123:abc");
        assert_eq!(policy.telegram.chat_id, "-1001");
    }

    #[test]
    fn prefilled_form_parses_back_to_the_same_policy() {
        let policy = AlertPolicy {
            threshold_cpu: 85,
            quiet_hours: "23:00-05:00".into(),
            use_cloudlinux: false,
            ..AlertPolicy::default()
        };
        let parsed = PolicyForm::from_policy(&policy)
            .parse(ParseMode::Strict)
            .unwrap();
        assert_eq!(parsed, policy);
    }

    #[test]
    fn parse_mode_from_str() {
        assert_eq!("Strict".parse::<ParseMode>().unwrap(), ParseMode::Strict);
        assert_eq!(" lenient ".parse::<ParseMode>().unwrap(), ParseMode::Lenient);
        assert!("loose".parse::<ParseMode>().is_err());
    }
}
