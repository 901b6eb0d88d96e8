// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

use crate::exec::LaunchError;

#[derive(Error, Debug)]
pub enum ProcwardError {
    /// Malformed definition or command payload. Nothing was mutated.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Process not found: {0}")]
    NotFound(String),

    /// The instance is still Starting/Running/Restarting.
    #[error("Process in use: {0}")]
    InUse(String),

    /// The durable file could not be written. In-memory state already
    /// reflects the change.
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Launch error: {0}")]
    Launch(#[from] LaunchError),

    /// A command the supervisor does not serve (host/UI-only).
    #[error("Unsupported command: {0}")]
    Unsupported(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProcwardError {
    /// Stable kebab-case code reported to the front end.
    pub fn code(&self) -> &'static str {
        match self {
            ProcwardError::Validation(_) => "validation-error",
            ProcwardError::NotFound(_) => "not-found",
            ProcwardError::InUse(_) => "in-use",
            ProcwardError::Persistence(_) => "persistence-error",
            ProcwardError::Launch(_) => "launch-error",
            ProcwardError::Unsupported(_) => "unsupported",
            ProcwardError::Config(_) => "config-error",
            ProcwardError::Io(_) => "io-error",
            ProcwardError::Toml(_) | ProcwardError::Json(_) => "parse-error",
            ProcwardError::Other(_) => "internal-error",
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ProcwardError>;
