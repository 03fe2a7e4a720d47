//! Bootstrap orchestration for `unotify init`.
//!
//! Prepares the policy directory and document so the daemon and the panel
//! start from a known, owner-only state. Every step is idempotent; running
//! `init` twice reports the second run as no-ops.

#![allow(missing_docs)]

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::store::ConfigStore;
use crate::store::atomic;

/// A single step in the init sequence.
#[derive(Debug, Clone, Serialize)]
pub struct InitStep {
    /// Human-readable description.
    pub description: String,
    /// Whether this step completed.
    pub done: bool,
    /// Error message if the step failed.
    pub error: Option<String>,
}

/// Structured report from an init run.
#[derive(Debug, Clone, Serialize)]
pub struct InitReport {
    pub steps: Vec<InitStep>,
    pub success: bool,
    pub policy_file: PathBuf,
    /// Whether a default document was written by this run.
    pub wrote_defaults: bool,
    pub dry_run: bool,
}

impl InitReport {
    fn new(policy_file: &Path, dry_run: bool) -> Self {
        Self {
            steps: Vec::new(),
            success: false,
            policy_file: policy_file.to_path_buf(),
            wrote_defaults: false,
            dry_run,
        }
    }

    fn step_ok(&mut self, description: impl Into<String>) {
        self.steps.push(InitStep {
            description: description.into(),
            done: true,
            error: None,
        });
    }

    fn step_fail(&mut self, description: impl Into<String>, error: impl Into<String>) {
        self.steps.push(InitStep {
            description: description.into(),
            done: false,
            error: Some(error.into()),
        });
    }

    fn step_plan(&mut self, description: impl Into<String>) {
        self.steps.push(InitStep {
            description: description.into(),
            done: false,
            error: None,
        });
    }
}

/// Options controlling the init orchestration.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Policy document to bootstrap.
    pub policy_file: PathBuf,
    /// Show plan without executing.
    pub dry_run: bool,
}

/// Run the init sequence:
/// 1. Create the policy directory (0700).
/// 2. Write the default document if none exists.
/// 3. Reset document permissions to 0600 when group/other can read it.
pub fn run_init_sequence(opts: &InitOptions) -> InitReport {
    let mut report = InitReport::new(&opts.policy_file, opts.dry_run);
    let store = ConfigStore::new(opts.policy_file.clone());
    let dir = opts
        .policy_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    // Step 1: policy directory.
    if opts.dry_run {
        report.step_plan(format!("Create policy directory: {}", dir.display()));
    } else if dir.is_dir() {
        report.step_ok(format!("Policy directory exists: {}", dir.display()));
    } else {
        match atomic::ensure_private_dir(dir) {
            Ok(()) => report.step_ok(format!("Created policy directory: {}", dir.display())),
            Err(e) => {
                report.step_fail(
                    format!("Create policy directory: {}", dir.display()),
                    e.to_string(),
                );
                return report;
            }
        }
    }

    // Step 2: default document.
    let file = opts.policy_file.display();
    if opts.dry_run {
        if opts.policy_file.exists() {
            report.step_plan(format!("Keep existing policy: {file}"));
        } else {
            report.step_plan(format!("Write default policy: {file}"));
        }
    } else {
        match store.initialize() {
            Ok(true) => {
                report.wrote_defaults = true;
                report.step_ok(format!("Wrote default policy: {file}"));
            }
            Ok(false) => report.step_ok(format!("Kept existing policy: {file}")),
            Err(e) => {
                report.step_fail(format!("Write default policy: {file}"), e.to_string());
                return report;
            }
        }
    }

    // Step 3: permissions.
    if opts.dry_run {
        report.step_plan(format!("Restrict policy permissions to 600: {file}"));
    } else {
        match store.tighten_permissions() {
            Ok(true) => report.step_ok(format!("Reset policy permissions to 600: {file}")),
            Ok(false) => report.step_ok(format!("Policy permissions already owner-only: {file}")),
            Err(e) => report.step_fail(
                format!("Restrict policy permissions: {file}"),
                e.to_string(),
            ),
        }
    }

    report.success = report.steps.iter().all(|s| s.error.is_none());
    report
}

/// Format an init report for terminal output.
#[must_use]
pub fn format_init_report(report: &InitReport) -> String {
    let mut out = String::new();

    let mode = if report.dry_run { "dry-run" } else { "init" };
    let _ = writeln!(out, "unotify {mode} report:\n");

    for step in &report.steps {
        let icon = if step.error.is_some() {
            "FAIL"
        } else if step.done {
            "DONE"
        } else {
            "PLAN"
        };
        let _ = writeln!(out, "  [{icon}] {}", step.description);
        if let Some(err) = &step.error {
            let _ = writeln!(out, "         error: {err}");
        }
    }

    if !report.dry_run && report.success {
        let _ = writeln!(out, "\n  Policy:  {}", report.policy_file.display());
    }

    out
}
