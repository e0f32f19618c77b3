//! Error taxonomy for the verdict pipeline and its collaborators.
//!
//! Codes are stable and machine-parseable (`SPAM-xxxx`). Nothing here is
//! retried: every failure propagates to the caller as-is.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the crate.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Empty or whitespace-only message handed to `evaluate` / `predict`.
    #[error("[SPAM-1001] no message provided")]
    EmptyMessage,

    /// Feedback label that is neither SPAM nor NOT SPAM (with or without `ADMIN_`).
    #[error("[SPAM-1002] unrecognised feedback label: {label:?}")]
    InvalidLabel { label: String },

    /// Classifier artifact could not be read or is malformed. Fatal at startup.
    #[error("[SPAM-2001] classifier artifact {path} failed to load: {details}")]
    ArtifactLoad { path: PathBuf, details: String },

    #[error("[SPAM-3001] store failure in {context}: {details}")]
    Store {
        context: &'static str,
        details: String,
    },

    #[error("[SPAM-4001] invalid configuration: {details}")]
    Config { details: String },
}

impl PipelineError {
    /// Stable error code, e.g. for JSON error bodies.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::EmptyMessage => "SPAM-1001",
            Self::InvalidLabel { .. } => "SPAM-1002",
            Self::ArtifactLoad { .. } => "SPAM-2001",
            Self::Store { .. } => "SPAM-3001",
            Self::Config { .. } => "SPAM-4001",
        }
    }

    /// Caller-side mistakes (bad input) as opposed to server faults.
    pub const fn is_input_error(&self) -> bool {
        matches!(self, Self::EmptyMessage | Self::InvalidLabel { .. })
    }

    pub fn artifact(path: impl AsRef<Path>, details: impl ToString) -> Self {
        Self::ArtifactLoad {
            path: path.as_ref().to_path_buf(),
            details: details.to_string(),
        }
    }

    pub fn store(context: &'static str, details: impl ToString) -> Self {
        Self::Store {
            context,
            details: details.to_string(),
        }
    }
}

impl From<rusqlite::Error> for PipelineError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Store {
            context: "rusqlite",
            details: value.to_string(),
        }
    }
}
