//! Durable storage of the single alert-policy document.
//!
//! [`ConfigStore::load`] never fails on a missing or unparsable document; it
//! falls back to defaults and records why in [`PolicyOrigin`].
//! [`ConfigStore::save`] replaces the document atomically with owner-only
//! permissions. Concurrent writers race last-write-wins; readers never see a
//! partial file.

pub mod atomic;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::core::errors::{Result, UnError};
use crate::core::policy::{AlertPolicy, PolicyOverlay};

/// Where a loaded policy came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyOrigin {
    /// No document on disk yet (first run).
    Defaults,
    /// Parsed from disk and merged over defaults.
    Stored,
    /// Document exists but could not be parsed; defaults were substituted.
    Corrupt {
        /// Parser message.
        details: String,
    },
}

/// Result of [`ConfigStore::load`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadedPolicy {
    /// Complete policy handed to callers.
    pub policy: AlertPolicy,
    /// How `policy` was obtained.
    pub origin: PolicyOrigin,
}

impl LoadedPolicy {
    /// Soft `CorruptConfig` warning, if the stored document was unusable.
    #[must_use]
    pub fn warning(&self, path: &Path) -> Option<UnError> {
        match &self.origin {
            PolicyOrigin::Corrupt { details } => Some(UnError::CorruptConfig {
                path: path.to_path_buf(),
                details: details.clone(),
            }),
            PolicyOrigin::Defaults | PolicyOrigin::Stored => None,
        }
    }
}

/// File-backed policy store.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing document path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document and merge it over the defaults.
    ///
    /// Only an unreadable (not missing) file is reported as an error.
    pub fn load(&self) -> Result<LoadedPolicy> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no policy document, using defaults");
                return Ok(LoadedPolicy {
                    policy: AlertPolicy::defaults(),
                    origin: PolicyOrigin::Defaults,
                });
            }
            Err(e) => return Err(UnError::io(&self.path, e)),
        };

        match parse_document(&bytes) {
            Ok(overlay) => Ok(LoadedPolicy {
                policy: AlertPolicy::defaults().merge(&overlay),
                origin: PolicyOrigin::Stored,
            }),
            Err(details) => {
                warn!(
                    path = %self.path.display(),
                    error = %details,
                    "policy document is corrupt, falling back to defaults"
                );
                Ok(LoadedPolicy {
                    policy: AlertPolicy::defaults(),
                    origin: PolicyOrigin::Corrupt { details },
                })
            }
        }
    }

    /// Replace the stored document with `policy`.
    ///
    /// Does not validate; callers that want enforcement call
    /// [`AlertPolicy::validate`] first.
    pub fn save(&self, policy: &AlertPolicy) -> Result<()> {
        let dir = self.parent_dir();
        atomic::ensure_private_dir(dir)?;

        let json = serde_json::to_vec_pretty(policy)
            .map_err(|e| UnError::persistence(&self.path, format!("cannot serialize: {e}")))?;
        atomic::atomic_write(&self.path, &json)?;

        info!(path = %self.path.display(), "policy saved");
        Ok(())
    }

    /// Write the default document if none exists. Returns whether it wrote.
    pub fn initialize(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        self.save(&AlertPolicy::defaults())?;
        Ok(true)
    }

    /// Reset an existing document to owner-only access if it is readable by
    /// group or others. Returns whether permissions changed.
    pub fn tighten_permissions(&self) -> Result<bool> {
        let mode = match atomic::mode_of(&self.path) {
            Ok(mode) => mode,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(UnError::io(&self.path, e)),
        };
        match mode {
            Some(bits) if bits & 0o077 != 0 => {
                atomic::set_mode(&self.path, atomic::FILE_MODE)
                    .map_err(|e| UnError::persistence(&self.path, format!("cannot set permissions: {e}")))?;
                warn!(
                    path = %self.path.display(),
                    previous = %format!("{bits:o}"),
                    "policy document was not owner-only; permissions reset to 600"
                );
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn parent_dir(&self) -> &Path {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }
}

/// Parse a stored document. Only JSON syntax errors and a non-object top
/// level are fatal; wrong-typed fields are coerced by [`PolicyOverlay`].
fn parse_document(bytes: &[u8]) -> std::result::Result<PolicyOverlay, String> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
    if !value.is_object() {
        return Err(format!(
            "top-level value must be an object, found {}",
            json_kind(&value)
        ));
    }
    PolicyOverlay::deserialize(value).map_err(|e| e.to_string())
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::policy::TelegramChannel;
    use tempfile::TempDir;

    fn store_in(tmp: &TempDir) -> ConfigStore {
        ConfigStore::new(tmp.path().join("uniquenotify").join("config.json"))
    }

    fn custom_policy() -> AlertPolicy {
        AlertPolicy {
            threshold_cpu: 80,
            cooldown_minutes: 15,
            quiet_hours: "22:00-06:00".into(),
            telegram: TelegramChannel {
                enabled: true,
                bot_token: "123:abc".into(),
                chat_id: "-1001".into(),
            },
            use_cloudlinux: false,
            interval_seconds: 60,
            max_alerts_per_hour: 5,
        }
    }

    #[test]
    fn missing_store_loads_defaults() {
        let tmp = TempDir::new().unwrap();
        let loaded = store_in(&tmp).load().unwrap();
        assert_eq!(loaded.policy, AlertPolicy::defaults());
        assert_eq!(loaded.origin, PolicyOrigin::Defaults);
    }

    #[test]
    fn save_then_load_round_trips() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        store.save(&custom_policy()).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.policy, custom_policy());
        assert_eq!(loaded.origin, PolicyOrigin::Stored);
    }

    #[test]
    fn invalid_json_falls_back_to_defaults() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{ not json").unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.policy, AlertPolicy::defaults());
        assert!(matches!(loaded.origin, PolicyOrigin::Corrupt { .. }));
        let warning = loaded.warning(store.path()).unwrap();
        assert_eq!(warning.code(), "UN-2001");
    }

    fn write_raw(store: &ConfigStore, raw: &str) {
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), raw).unwrap();
    }

    #[test]
    fn string_typed_number_is_coerced() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        write_raw(&store, r#"{"threshold_cpu": "85", "interval_seconds": 60.0}"#);

        let loaded = store.load().unwrap();
        assert_eq!(loaded.origin, PolicyOrigin::Stored);
        assert_eq!(loaded.policy.threshold_cpu, 85);
        assert_eq!(loaded.policy.interval_seconds, 60);
    }

    #[test]
    fn wrong_typed_field_keeps_credentials() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        write_raw(
            &store,
            r#"{"threshold_cpu": "high", "cooldown_minutes": 20,
                "telegram": {"enabled": true, "bot_token": "123:abc", "chat_id": -1001}}"#,
        );

        let loaded = store.load().unwrap();
        assert_eq!(loaded.origin, PolicyOrigin::Stored);
        assert_eq!(loaded.policy.threshold_cpu, 0);
        assert_eq!(loaded.policy.cooldown_minutes, 20);
        assert_eq!(loaded.policy.telegram.bot_token, "123:abc");
        assert_eq!(loaded.policy.telegram.chat_id, "-1001");
        let flagged: Vec<_> = loaded
            .policy
            .validate()
            .iter()
            .map(|v| v.field.as_str())
            .collect();
        assert_eq!(flagged, ["threshold_cpu"]);
    }

    #[test]
    fn non_object_document_counts_as_corrupt() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        for raw in ["[90, 30]", "42", "null", r#""config""#] {
            write_raw(&store, raw);
            let loaded = store.load().unwrap();
            assert_eq!(loaded.policy, AlertPolicy::defaults(), "{raw}");
            assert!(
                matches!(loaded.origin, PolicyOrigin::Corrupt { ref details } if details.contains("object")),
                "{raw}: {:?}",
                loaded.origin
            );
        }
    }

    #[test]
    fn non_object_channel_is_ignored() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        write_raw(&store, r#"{"threshold_cpu": 70, "telegram": "off"}"#);
        let loaded = store.load().unwrap();
        assert_eq!(loaded.origin, PolicyOrigin::Stored);
        assert_eq!(loaded.policy.threshold_cpu, 70);
        assert_eq!(loaded.policy.telegram, TelegramChannel::default());
    }

    #[test]
    fn partial_document_is_completed_from_defaults() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(
            store.path(),
            r#"{"threshold_cpu": 70, "telegram": {"bot_token": "t"}, "legacy": 1}"#,
        )
        .unwrap();

        let policy = store.load().unwrap().policy;
        assert_eq!(policy.threshold_cpu, 70);
        assert_eq!(policy.cooldown_minutes, 30);
        assert_eq!(policy.telegram.bot_token, "t");
        assert!(policy.telegram.enabled);
        assert_eq!(policy.telegram.chat_id, "");
    }

    #[test]
    fn save_does_not_validate() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        let invalid = AlertPolicy {
            threshold_cpu: 500,
            ..AlertPolicy::default()
        };
        store.save(&invalid).unwrap();
        assert_eq!(store.load().unwrap().policy.threshold_cpu, 500);
    }

    #[test]
    fn initialize_writes_defaults_once() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        assert!(store.initialize().unwrap());
        assert_eq!(store.load().unwrap().origin, PolicyOrigin::Stored);

        store.save(&custom_policy()).unwrap();
        assert!(!store.initialize().unwrap());
        assert_eq!(store.load().unwrap().policy, custom_policy());
    }

    #[cfg(unix)]
    #[test]
    fn tighten_permissions_resets_world_readable_file() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        store.save(&AlertPolicy::defaults()).unwrap();
        assert!(!store.tighten_permissions().unwrap());

        atomic::set_mode(store.path(), 0o644).unwrap();
        assert!(store.tighten_permissions().unwrap());
        assert_eq!(atomic::mode_of(store.path()).unwrap(), Some(0o600));
    }

    #[test]
    fn tighten_permissions_on_missing_file_is_noop() {
        let tmp = TempDir::new().unwrap();
        assert!(!store_in(&tmp).tighten_permissions().unwrap());
    }

    #[test]
    fn save_fails_when_directory_cannot_be_created() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "file, not dir").unwrap();
        let store = ConfigStore::new(blocker.join("config.json"));

        let err = store.save(&AlertPolicy::defaults()).unwrap_err();
        assert_eq!(err.code(), "UN-2002");
    }
}
