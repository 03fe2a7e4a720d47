//! Unique Notify: configuration core for the uniquenotify CPU alert daemon.
//!
//! Loads, validates and atomically persists the alert policy document,
//! verifies the Telegram channel with a real message, and controls the
//! daemon through systemd. [`facade::ConfigurationFacade`] is the entry
//! point for front ends.

pub mod core;
pub mod facade;
pub mod logger;
pub mod notify;
pub mod service;
pub mod store;

#[cfg(feature = "cli")]
pub mod cli;
#[cfg(feature = "cli")]
pub mod cli_app;

pub use crate::core::errors::{Result, UnError};
pub use crate::core::policy::{AlertPolicy, TelegramChannel};
pub use crate::facade::{ActionResult, ConfigurationFacade, SaveOutcome};
