//! Caller-facing operations: load, save, test, restart, status.
//!
//! Each operation maps to one operator intent and returns a value the UI can
//! render directly; nothing here panics or exits. The facade holds only its
//! collaborators and the input policy from [`Settings`].

#![allow(missing_docs)]

use serde::Serialize;
use tracing::warn;

use crate::core::errors::UnError;
use crate::core::form::{ParseMode, PolicyForm};
use crate::core::policy::{AlertPolicy, TelegramChannel};
use crate::core::settings::Settings;
use crate::notify::{NotificationTester, TelegramTester};
use crate::service::{ServiceController, ServiceManager, ServiceStatus, Systemctl};
use crate::store::ConfigStore;

pub const SAVE_OK: &str =
    "✅ Configuration saved successfully! Restart the service for changes to take effect.";
pub const TEST_OK: &str = "✅ Test message sent successfully! Check your Telegram chat.";
pub const RESTART_OK: &str = "✅ Unique Notify service restarted successfully!";

/// `{success, message}` pair rendered by the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
}

impl ActionResult {
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Outcome of a save: the message pair plus the reloaded document on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    #[serde(flatten)]
    pub result: ActionResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<AlertPolicy>,
}

impl SaveOutcome {
    fn rejected(message: impl Into<String>) -> Self {
        Self {
            result: ActionResult::failed(message),
            policy: None,
        }
    }
}

/// Orchestrates the store, channel tester, and service controller.
pub struct ConfigurationFacade<N = TelegramTester, M = Systemctl> {
    store: ConfigStore,
    tester: N,
    service: ServiceController<M>,
    parse_mode: ParseMode,
    enforce_validation: bool,
}

impl ConfigurationFacade<TelegramTester, Systemctl> {
    /// Wire production collaborators from settings.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            ConfigStore::new(settings.paths.policy_file.clone()),
            TelegramTester::from_settings(&settings.telegram),
            ServiceController::from_settings(&settings.service),
        )
        .with_input_policy(settings.input.parse_mode, settings.input.enforce_validation)
    }
}

impl<N: NotificationTester, M: ServiceManager> ConfigurationFacade<N, M> {
    /// Strict parsing and enforced validation by default.
    #[must_use]
    pub fn new(store: ConfigStore, tester: N, service: ServiceController<M>) -> Self {
        Self {
            store,
            tester,
            service,
            parse_mode: ParseMode::Strict,
            enforce_validation: true,
        }
    }

    #[must_use]
    pub fn with_input_policy(mut self, parse_mode: ParseMode, enforce_validation: bool) -> Self {
        self.parse_mode = parse_mode;
        self.enforce_validation = enforce_validation;
        self
    }

    #[must_use]
    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    #[must_use]
    pub fn parse_mode(&self) -> ParseMode {
        self.parse_mode
    }

    /// Current policy; corrupt or unreadable stores yield defaults.
    pub fn handle_load(&self) -> AlertPolicy {
        match self.store.load() {
            Ok(loaded) => loaded.policy,
            Err(e) => {
                warn!(error = %e, "policy store unreadable, showing defaults");
                AlertPolicy::defaults()
            }
        }
    }

    /// Persist `input` and return the reloaded document.
    pub fn handle_save(&self, input: &AlertPolicy) -> SaveOutcome {
        if self.enforce_validation {
            let violations = input.validate();
            if !violations.is_empty() {
                let err = UnError::InvalidPolicy { violations };
                warn!(error = %err, "save rejected by validation");
                return SaveOutcome::rejected(save_failure(&err));
            }
        }

        if let Err(e) = self.store.save(input) {
            return SaveOutcome::rejected(save_failure(&e));
        }

        SaveOutcome {
            result: ActionResult::ok(SAVE_OK),
            policy: Some(self.handle_load()),
        }
    }

    /// Parse raw form input, then save it.
    pub fn handle_submit(&self, form: &PolicyForm) -> SaveOutcome {
        match form.parse(self.parse_mode) {
            Ok(policy) => self.handle_save(&policy),
            Err(e) => SaveOutcome::rejected(save_failure(&e)),
        }
    }

    /// Send a verification message through `channel`.
    pub fn handle_test(&self, channel: &TelegramChannel) -> ActionResult {
        match self.tester.test(channel) {
            Ok(_) => ActionResult::ok(TEST_OK),
            Err(e) => ActionResult::failed(test_failure(&e)),
        }
    }

    /// Restart the monitoring daemon.
    pub fn handle_restart(&self) -> ActionResult {
        match self.service.restart() {
            Ok(()) => ActionResult::ok(RESTART_OK),
            Err(UnError::ServiceControl { output, .. }) => {
                ActionResult::failed(format!("❌ Failed to restart service: {output}"))
            }
            Err(e) => ActionResult::failed(format!("❌ Failed to restart service: {e}")),
        }
    }

    pub fn handle_status(&self) -> ServiceStatus {
        self.service.status()
    }
}

fn save_failure(err: &UnError) -> String {
    format!("❌ Error saving configuration: {err}")
}

fn test_failure(err: &UnError) -> String {
    match err {
        UnError::MissingCredentials { details } => format!("❌ {details}"),
        UnError::ChannelUnreachable { details } => format!("❌ {details}"),
        UnError::ChannelRejected { description } => {
            format!("❌ Telegram API error: {description}")
        }
        other => format!("❌ {other}"),
    }
}
