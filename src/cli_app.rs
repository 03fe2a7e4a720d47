//! Top-level CLI definition and dispatch.

#![allow(missing_docs)]

use std::io::{self, Write as _};
use std::path::PathBuf;

use clap::{ArgAction, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use colored::Colorize;
use serde::Serialize;
use serde_json::json;

use crate::cli::init::{InitOptions, format_init_report, run_init_sequence};
use crate::core::errors::{Result, UnError};
use crate::core::form::{ParseMode, PolicyForm};
use crate::core::policy::{AlertPolicy, ValidationError};
use crate::core::settings::Settings;
use crate::facade::{ActionResult, ConfigurationFacade, SaveOutcome};
use crate::service::ServiceState;

/// Unique Notify: alert-policy configuration for the uniquenotify CPU alert daemon.
#[derive(Parser, Debug)]
#[command(name = "unotify", version, about)]
pub struct Cli {
    /// Settings file (default: /etc/uniquenotify/unotify.toml when present).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Emit a single JSON object instead of human text.
    #[arg(long, global = true)]
    pub json: bool,
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the effective alert policy.
    Show,
    /// Update policy fields and save.
    Set(SetArgs),
    /// Validate the stored policy.
    Validate,
    /// Send a Telegram verification message.
    Test(TestArgs),
    /// Restart the monitoring service.
    Restart,
    /// Show monitoring service state.
    Status,
    /// Create the policy directory and default document.
    Init {
        /// Show plan without executing.
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the effective tool settings as TOML.
    Settings,
    /// Generate a shell completion script.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

/// On/off switch for checkbox-style fields.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    const fn enabled(self) -> bool {
        matches!(self, Self::On)
    }
}

/// Arguments for `unotify set`. Numeric values are taken as text and parsed
/// by the configured form mode.
#[derive(clap::Args, Debug, Default)]
pub struct SetArgs {
    #[arg(long, value_name = "PERCENT")]
    pub threshold_cpu: Option<String>,
    #[arg(long, value_name = "MINUTES")]
    pub cooldown_minutes: Option<String>,
    /// `HH:MM-HH:MM`, or an empty string to disable.
    #[arg(long, value_name = "WINDOW")]
    pub quiet_hours: Option<String>,
    #[arg(long, value_name = "SECONDS")]
    pub interval_seconds: Option<String>,
    #[arg(long, value_name = "COUNT")]
    pub max_alerts_per_hour: Option<String>,
    #[arg(long, value_name = "TOKEN")]
    pub bot_token: Option<String>,
    #[arg(long, value_name = "ID")]
    pub chat_id: Option<String>,
    #[arg(long, value_enum)]
    pub telegram: Option<Toggle>,
    #[arg(long, value_enum)]
    pub cloudlinux: Option<Toggle>,
    /// Coerce non-numeric values to integers instead of rejecting them.
    #[arg(long)]
    pub lenient: bool,
}

impl SetArgs {
    /// Overlay the supplied flags onto `form`.
    fn apply(&self, form: &mut PolicyForm) {
        let text = [
            (&mut form.threshold_cpu, &self.threshold_cpu),
            (&mut form.cooldown_minutes, &self.cooldown_minutes),
            (&mut form.quiet_hours, &self.quiet_hours),
            (&mut form.interval_seconds, &self.interval_seconds),
            (&mut form.max_alerts_per_hour, &self.max_alerts_per_hour),
            (&mut form.bot_token, &self.bot_token),
            (&mut form.chat_id, &self.chat_id),
        ];
        for (slot, value) in text {
            if let Some(value) = value {
                *slot = Some(value.clone());
            }
        }
        if let Some(toggle) = self.telegram {
            form.telegram_enabled = toggle.enabled();
        }
        if let Some(toggle) = self.cloudlinux {
            form.use_cloudlinux = toggle.enabled();
        }
    }
}

/// Arguments for `unotify test`.
#[derive(clap::Args, Debug, Default)]
pub struct TestArgs {
    /// Use this token instead of the stored one.
    #[arg(long, value_name = "TOKEN")]
    pub bot_token: Option<String>,
    /// Use this chat id instead of the stored one.
    #[arg(long, value_name = "ID")]
    pub chat_id: Option<String>,
}

/// Result of a command that ran to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The requested action succeeded.
    Success,
    /// The requested action ran but failed; details were printed.
    ActionFailed,
}

impl Outcome {
    const fn from_success(success: bool) -> Self {
        if success {
            Self::Success
        } else {
            Self::ActionFailed
        }
    }

    /// Process exit status.
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::ActionFailed => 1,
        }
    }
}

/// Exit status for errors that stop a command before it runs.
pub const USAGE_EXIT_CODE: u8 = 2;

/// Dispatch CLI commands.
///
/// # Errors
/// Settings and output errors; action failures are reported through
/// [`Outcome::ActionFailed`] instead.
pub fn run(cli: &Cli) -> Result<Outcome> {
    if let Command::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "unotify", &mut io::stdout());
        return Ok(Outcome::Success);
    }

    let settings = Settings::load(cli.config.as_deref())?;
    let facade = ConfigurationFacade::from_settings(&settings);

    match &cli.command {
        Command::Show => show(cli, &facade),
        Command::Set(args) => set(cli, &settings, facade, args),
        Command::Validate => validate(cli, &facade),
        Command::Test(args) => {
            let mut channel = facade.handle_load().telegram;
            if let Some(token) = &args.bot_token {
                channel.bot_token.clone_from(token);
            }
            if let Some(chat_id) = &args.chat_id {
                channel.chat_id.clone_from(chat_id);
            }
            emit_action(cli, &facade.handle_test(&channel))
        }
        Command::Restart => emit_action(cli, &facade.handle_restart()),
        Command::Status => status(cli, &settings, &facade),
        Command::Init { dry_run } => {
            let report = run_init_sequence(&InitOptions {
                policy_file: settings.paths.policy_file.clone(),
                dry_run: *dry_run,
            });
            if cli.json {
                print_json(&report)?;
            } else {
                print!("{}", format_init_report(&report));
            }
            Ok(Outcome::from_success(report.success))
        }
        Command::Settings => {
            if cli.json {
                print_json(&settings)?;
            } else {
                print!("{}", settings.to_toml()?);
            }
            Ok(Outcome::Success)
        }
        Command::Completions { .. } => Ok(Outcome::Success),
    }
}

/// Stored policy plus store-level warnings (corrupt or unreadable document).
fn load_with_warnings(facade: &ConfigurationFacade) -> (AlertPolicy, Vec<String>) {
    let store = facade.store();
    match store.load() {
        Ok(loaded) => {
            let warning = loaded.warning(store.path()).map(|e| e.to_string());
            (loaded.policy, warning.into_iter().collect())
        }
        Err(e) => (AlertPolicy::defaults(), vec![e.to_string()]),
    }
}

fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        eprintln!("{} {warning}", "warning:".yellow().bold());
    }
}

fn show(cli: &Cli, facade: &ConfigurationFacade) -> Result<Outcome> {
    let store = facade.store();
    let (policy, mut warnings) = load_with_warnings(facade);
    if policy.telegram.enabled && !policy.telegram.has_credentials() {
        warnings.push(
            UnError::MissingCredentials {
                details: "Telegram is enabled but the bot token or chat id is empty".to_string(),
            }
            .to_string(),
        );
    }

    if cli.json {
        print_json(&json!({
            "path": store.path(),
            "policy": redacted(&policy),
            "warnings": warnings,
        }))?;
        return Ok(Outcome::Success);
    }

    println!("{}", format!("Policy: {}", store.path().display()).bold());
    print_policy(&policy);
    print_warnings(&warnings);
    Ok(Outcome::Success)
}

fn set(
    cli: &Cli,
    settings: &Settings,
    facade: ConfigurationFacade,
    args: &SetArgs,
) -> Result<Outcome> {
    let facade = if args.lenient {
        facade.with_input_policy(ParseMode::Lenient, settings.input.enforce_validation)
    } else {
        facade
    };

    // A corrupt store is about to be replaced; say so before it happens.
    let (current, warnings) = load_with_warnings(&facade);
    print_warnings(&warnings);

    let mut form = PolicyForm::from_policy(&current);
    args.apply(&mut form);
    let outcome = facade.handle_submit(&form);
    emit_save(cli, &outcome, &warnings)
}

fn validate(cli: &Cli, facade: &ConfigurationFacade) -> Result<Outcome> {
    let violations: Vec<ValidationError> = facade.handle_load().validate();
    if cli.json {
        print_json(&json!({
            "valid": violations.is_empty(),
            "violations": violations
                .iter()
                .map(|v| json!({"field": v.field.as_str(), "message": v.message}))
                .collect::<Vec<_>>(),
        }))?;
    } else if violations.is_empty() {
        println!("{}", "Policy is valid.".green());
    } else {
        println!("{}", "Policy has problems:".red().bold());
        for violation in &violations {
            println!("  - {violation}");
        }
    }
    Ok(Outcome::from_success(violations.is_empty()))
}

fn status(cli: &Cli, settings: &Settings, facade: &ConfigurationFacade) -> Result<Outcome> {
    let status = facade.handle_status();
    let state = status.state();
    if cli.json {
        print_json(&json!({
            "unit": settings.service.unit,
            "active": status.active,
            "state": state,
            "raw_output": status.raw_output,
        }))?;
    } else {
        let label = match state {
            ServiceState::Active => state.as_str().green().bold(),
            ServiceState::Failed => state.as_str().red().bold(),
            ServiceState::Inactive | ServiceState::Unknown => state.as_str().yellow().bold(),
            _ => state.as_str().cyan().bold(),
        };
        println!("{}: {label}", settings.service.unit);
        if state == ServiceState::Unknown && !status.raw_output.is_empty() {
            println!("  {}", status.raw_output);
        }
    }
    Ok(Outcome::Success)
}

fn emit_action(cli: &Cli, result: &ActionResult) -> Result<Outcome> {
    if cli.json {
        print_json(result)?;
    } else {
        print_message(result);
    }
    Ok(Outcome::from_success(result.success))
}

fn emit_save(cli: &Cli, outcome: &SaveOutcome, warnings: &[String]) -> Result<Outcome> {
    if cli.json {
        let mut payload = serde_json::to_value(outcome)?;
        if let Some(policy) = &outcome.policy {
            payload["policy"] = serde_json::to_value(redacted(policy))?;
        }
        payload["warnings"] = json!(warnings);
        print_json(&payload)?;
    } else {
        print_message(&outcome.result);
        if let Some(policy) = &outcome.policy {
            print_policy(policy);
        }
    }
    Ok(Outcome::from_success(outcome.result.success))
}

fn print_message(result: &ActionResult) {
    if result.success {
        println!("{}", result.message.green());
    } else {
        println!("{}", result.message.red());
    }
}

fn print_policy(policy: &AlertPolicy) {
    let quiet = if policy.quiet_hours.trim().is_empty() {
        "disabled".to_string()
    } else {
        policy.quiet_hours.clone()
    };
    println!("  threshold_cpu        {}%", policy.threshold_cpu);
    println!("  cooldown_minutes     {}", policy.cooldown_minutes);
    println!("  quiet_hours          {quiet}");
    println!("  interval_seconds     {}", policy.interval_seconds);
    println!("  max_alerts_per_hour  {}", policy.max_alerts_per_hour);
    println!("  use_cloudlinux       {}", policy.use_cloudlinux);
    println!("  telegram.enabled     {}", policy.telegram.enabled);
    println!("  telegram.bot_token   {}", mask_secret(&policy.telegram.bot_token));
    println!("  telegram.chat_id     {}", policy.telegram.chat_id);
}

/// Copy of `policy` safe for output: a set bot token is masked, an empty one
/// stays empty.
fn redacted(policy: &AlertPolicy) -> AlertPolicy {
    let mut shown = policy.clone();
    if !shown.telegram.bot_token.trim().is_empty() {
        shown.telegram.bot_token = mask_secret(&shown.telegram.bot_token);
    }
    shown
}

/// Keep the bot id prefix of a token, hide the secret part.
fn mask_secret(token: &str) -> String {
    let token = token.trim();
    if token.is_empty() {
        return "(not set)".to_string();
    }
    match token.split_once(':') {
        Some((bot_id, _)) => format!("{bot_id}:****"),
        None => "****".to_string(),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{rendered}").map_err(|e| UnError::io("<stdout>", e))
}
