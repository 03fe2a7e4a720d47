//! UN-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::policy::ValidationError;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, UnError>;

/// Top-level error type for Unique Notify.
#[derive(Debug, Error)]
pub enum UnError {
    #[error("[UN-1001] invalid settings: {details}")]
    InvalidSettings { details: String },

    #[error("[UN-1002] missing settings file: {path}")]
    MissingSettings { path: PathBuf },

    #[error("[UN-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[UN-1004] invalid alert policy: {}", join_violations(.violations))]
    InvalidPolicy { violations: Vec<ValidationError> },

    #[error("[UN-1005] invalid form input: {details}")]
    InvalidInput { details: String },

    #[error("[UN-2001] corrupt policy document at {path}: {details}")]
    CorruptConfig { path: PathBuf, details: String },

    #[error("[UN-2002] failed to persist policy to {path}: {details}")]
    Persistence { path: PathBuf, details: String },

    #[error("[UN-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[UN-3001] missing channel credentials: {details}")]
    MissingCredentials { details: String },

    #[error("[UN-3002] notification channel unreachable: {details}")]
    ChannelUnreachable { details: String },

    #[error("[UN-3003] notification channel rejected the message: {description}")]
    ChannelRejected { description: String },

    #[error("[UN-4001] service control failed for {unit}: {output}")]
    ServiceControl { unit: String, output: String },

    #[error("[UN-9001] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl UnError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidSettings { .. } => "UN-1001",
            Self::MissingSettings { .. } => "UN-1002",
            Self::ConfigParse { .. } => "UN-1003",
            Self::InvalidPolicy { .. } => "UN-1004",
            Self::InvalidInput { .. } => "UN-1005",
            Self::CorruptConfig { .. } => "UN-2001",
            Self::Persistence { .. } => "UN-2002",
            Self::Serialization { .. } => "UN-2101",
            Self::MissingCredentials { .. } => "UN-3001",
            Self::ChannelUnreachable { .. } => "UN-3002",
            Self::ChannelRejected { .. } => "UN-3003",
            Self::ServiceControl { .. } => "UN-4001",
            Self::Io { .. } => "UN-9001",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::Persistence { .. }
                | Self::ChannelUnreachable { .. }
                | Self::ServiceControl { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for persistence failures.
    #[must_use]
    pub fn persistence(path: impl AsRef<Path>, details: impl Into<String>) -> Self {
        Self::Persistence {
            path: path.as_ref().to_path_buf(),
            details: details.into(),
        }
    }
}

fn join_violations(violations: &[ValidationError]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<serde_json::Error> for UnError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for UnError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
