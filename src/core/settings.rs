//! Tool settings: where the policy lives, which unit to control, and how to
//! reach the Telegram API.
//!
//! Loaded from TOML (`/etc/uniquenotify/unotify.toml` by default), then
//! overridden by `UNOTIFY_*` environment variables, then validated.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, UnError};
use crate::core::form::ParseMode;

/// Default location of the settings file.
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/uniquenotify/unotify.toml";

const MAX_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsSettings {
    /// JSON policy document consumed by the daemon.
    pub policy_file: PathBuf,
}

impl Default for PathsSettings {
    fn default() -> Self {
        Self {
            policy_file: PathBuf::from("/var/cpanel/uniquenotify/config.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceSettings {
    /// systemd unit of the monitoring daemon.
    pub unit: String,
    /// `systemctl` executable.
    pub systemctl: PathBuf,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            unit: "uniquenotify.service".to_string(),
            systemctl: PathBuf::from("systemctl"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelegramSettings {
    /// Bot API base URL, without trailing slash.
    pub api_base: String,
    /// Upper bound for the verification request.
    pub timeout_secs: u64,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.telegram.org".to_string(),
            timeout_secs: 10,
        }
    }
}

impl TelegramSettings {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputSettings {
    pub parse_mode: ParseMode,
    /// Reject saves that fail policy validation.
    pub enforce_validation: bool,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            parse_mode: ParseMode::Strict,
            enforce_validation: true,
        }
    }
}

/// Complete tool settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub paths: PathsSettings,
    pub service: ServiceSettings,
    pub telegram: TelegramSettings,
    pub input: InputSettings,
}

impl Settings {
    /// Load settings from `explicit`, or from [`DEFAULT_SETTINGS_PATH`] when it
    /// exists, then apply process environment overrides and validate.
    ///
    /// A missing explicit file is an error; a missing default file is not.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut settings = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(UnError::MissingSettings {
                        path: path.to_path_buf(),
                    });
                }
                Self::from_file(path)?
            }
            None => {
                let default_path = Path::new(DEFAULT_SETTINGS_PATH);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        settings.apply_env_overrides_with(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse a settings file without overrides or validation.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| UnError::io(path, e))?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply `UNOTIFY_*` overrides read through `lookup`.
    pub fn apply_env_overrides_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("UNOTIFY_POLICY_FILE") {
            self.paths.policy_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("UNOTIFY_SERVICE_UNIT") {
            self.service.unit = v;
        }
        if let Some(v) = lookup("UNOTIFY_SYSTEMCTL") {
            self.service.systemctl = PathBuf::from(v);
        }
        if let Some(v) = lookup("UNOTIFY_TELEGRAM_API") {
            self.telegram.api_base = v;
        }
        if let Some(v) = lookup("UNOTIFY_TELEGRAM_TIMEOUT_SECS") {
            self.telegram.timeout_secs =
                v.trim().parse().map_err(|_| UnError::InvalidSettings {
                    details: format!("UNOTIFY_TELEGRAM_TIMEOUT_SECS must be an integer, got {v:?}"),
                })?;
        }
        if let Some(v) = lookup("UNOTIFY_PARSE_MODE") {
            self.input.parse_mode = v.parse()?;
        }
        Ok(())
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.service.unit.trim().is_empty() {
            return Err(UnError::InvalidSettings {
                details: "service.unit must not be empty".to_string(),
            });
        }
        if self.paths.policy_file.file_name().is_none() {
            return Err(UnError::InvalidSettings {
                details: format!(
                    "paths.policy_file must name a file, got {}",
                    self.paths.policy_file.display()
                ),
            });
        }
        if !(1..=MAX_TIMEOUT_SECS).contains(&self.telegram.timeout_secs) {
            return Err(UnError::InvalidSettings {
                details: format!(
                    "telegram.timeout_secs must be between 1 and {MAX_TIMEOUT_SECS}, got {}",
                    self.telegram.timeout_secs
                ),
            });
        }
        let base = self.telegram.api_base.as_str();
        if !(base.starts_with("https://") || base.starts_with("http://")) {
            return Err(UnError::InvalidSettings {
                details: format!("telegram.api_base must be an http(s) URL, got {base:?}"),
            });
        }
        Ok(())
    }

    /// Render as pretty TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| UnError::Serialization {
            context: "toml",
            details: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert_eq!(settings.service.unit, "uniquenotify.service");
        assert_eq!(settings.telegram.timeout(), Duration::from_secs(10));
        assert_eq!(settings.input.parse_mode, ParseMode::Strict);
        assert!(settings.input.enforce_validation);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let settings = Settings::from_toml(
            r#"
            [paths]
            policy_file = "/tmp/un/config.json"

            [input]
            parse_mode = "lenient"
            "#,
        )
        .unwrap();
        assert_eq!(settings.paths.policy_file, PathBuf::from("/tmp/un/config.json"));
        assert_eq!(settings.input.parse_mode, ParseMode::Lenient);
        assert!(settings.input.enforce_validation);
        assert_eq!(settings.service, ServiceSettings::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Settings::from_toml("[service]\nname = \"x\"\n").unwrap_err();
        assert_eq!(err.code(), "UN-1003");
    }

    #[test]
    fn env_overrides_apply() {
        let mut settings = Settings::default();
        settings
            .apply_env_overrides_with(env(&[
                ("UNOTIFY_SERVICE_UNIT", "other.service"),
                ("UNOTIFY_TELEGRAM_TIMEOUT_SECS", "3"),
                ("UNOTIFY_PARSE_MODE", "lenient"),
            ]))
            .unwrap();
        assert_eq!(settings.service.unit, "other.service");
        assert_eq!(settings.telegram.timeout_secs, 3);
        assert_eq!(settings.input.parse_mode, ParseMode::Lenient);
    }

    #[test]
    fn bad_env_timeout_is_an_error() {
        let mut settings = Settings::default();
        let err = settings
            .apply_env_overrides_with(env(&[("UNOTIFY_TELEGRAM_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert_eq!(err.code(), "UN-1001");
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.service.unit = "  ".into();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.telegram.timeout_secs = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.telegram.api_base = "ftp://example".into();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.paths.policy_file = PathBuf::from("/");
        assert!(settings.validate().is_err());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = Settings::load(Some(&tmp.path().join("absent.toml"))).unwrap_err();
        assert_eq!(err.code(), "UN-1002");
    }

    #[test]
    fn toml_round_trip() {
        let settings = Settings::default();
        let rendered = settings.to_toml().unwrap();
        assert_eq!(Settings::from_toml(&rendered).unwrap(), settings);
    }
}
