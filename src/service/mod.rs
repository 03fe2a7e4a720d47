//! Lifecycle control of the external monitoring daemon through the OS
//! service manager.
//!
//! Both operations block for the duration of the underlying command and
//! impose no timeout of their own.

#![allow(missing_docs)]

use std::io;
use std::path::PathBuf;
use std::process::Command;

use serde::Serialize;
use tracing::{debug, warn};

use crate::core::errors::{Result, UnError};
use crate::core::settings::ServiceSettings;

/// Exit status and captured text of one service-manager invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    /// stdout followed by stderr, trimmed.
    pub text: String,
}

/// Platform service-manager seam.
pub trait ServiceManager {
    /// Query whether `unit` is active.
    fn query_active(&self, unit: &str) -> io::Result<CommandOutput>;
    /// Restart `unit`.
    fn restart(&self, unit: &str) -> io::Result<CommandOutput>;
}

/// systemd via the `systemctl` executable.
#[derive(Debug, Clone)]
pub struct Systemctl {
    program: PathBuf,
}

impl Default for Systemctl {
    fn default() -> Self {
        Self::new("systemctl")
    }
}

impl Systemctl {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, action: &str, unit: &str) -> io::Result<CommandOutput> {
        debug!(program = %self.program.display(), action, unit, "invoking service manager");
        let output = Command::new(&self.program).arg(action).arg(unit).output()?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !text.trim().is_empty() {
                text.push('\n');
            }
            text.push_str(&stderr);
        }

        debug!(action, unit, code = ?output.status.code(), "service manager finished");
        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            text: text.trim().to_string(),
        })
    }
}

impl ServiceManager for Systemctl {
    fn query_active(&self, unit: &str) -> io::Result<CommandOutput> {
        self.run("is-active", unit)
    }

    fn restart(&self, unit: &str) -> io::Result<CommandOutput> {
        self.run("restart", unit)
    }
}

/// Coarse unit state as printed by `systemctl is-active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Active,
    Inactive,
    Failed,
    Activating,
    Deactivating,
    Reloading,
    Unknown,
}

impl ServiceState {
    #[must_use]
    pub fn from_output(raw: &str) -> Self {
        match raw.lines().next().unwrap_or("").trim() {
            "active" => Self::Active,
            "inactive" => Self::Inactive,
            "failed" => Self::Failed,
            "activating" => Self::Activating,
            "deactivating" => Self::Deactivating,
            "reloading" => Self::Reloading,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Failed => "failed",
            Self::Activating => "activating",
            Self::Deactivating => "deactivating",
            Self::Reloading => "reloading",
            Self::Unknown => "unknown",
        }
    }
}

/// Snapshot returned by [`ServiceController::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub active: bool,
    pub raw_output: String,
}

impl ServiceStatus {
    #[must_use]
    pub fn state(&self) -> ServiceState {
        match ServiceState::from_output(&self.raw_output) {
            // A zero exit from `is-active` means active whatever was printed.
            ServiceState::Unknown if self.active => ServiceState::Active,
            state => state,
        }
    }
}

/// Observes and restarts one fixed unit.
#[derive(Debug, Clone)]
pub struct ServiceController<M = Systemctl> {
    manager: M,
    unit: String,
}

impl ServiceController<Systemctl> {
    #[must_use]
    pub fn from_settings(settings: &ServiceSettings) -> Self {
        Self::new(Systemctl::new(&settings.systemctl), settings.unit.clone())
    }
}

impl<M: ServiceManager> ServiceController<M> {
    #[must_use]
    pub fn new(manager: M, unit: impl Into<String>) -> Self {
        Self {
            manager,
            unit: unit.into(),
        }
    }

    #[must_use]
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Current state. Never fails: a query that cannot run reports inactive
    /// with the error text as output.
    pub fn status(&self) -> ServiceStatus {
        match self.manager.query_active(&self.unit) {
            Ok(out) => ServiceStatus {
                active: out.success,
                raw_output: out.text,
            },
            Err(e) => {
                warn!(unit = %self.unit, error = %e, "service status query could not run");
                ServiceStatus {
                    active: false,
                    raw_output: e.to_string(),
                }
            }
        }
    }

    /// Restart the unit; succeeds only on a zero exit status.
    pub fn restart(&self) -> Result<()> {
        let out = self
            .manager
            .restart(&self.unit)
            .map_err(|e| UnError::ServiceControl {
                unit: self.unit.clone(),
                output: e.to_string(),
            })?;
        if out.success {
            return Ok(());
        }
        warn!(unit = %self.unit, code = ?out.code, output = %out.text, "service restart failed");
        Err(UnError::ServiceControl {
            unit: self.unit.clone(),
            output: out.text,
        })
    }
}
