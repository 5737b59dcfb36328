// File: cmdgate-common/src/error.rs

use thiserror::Error;

/// Infrastructure errors: config, ledger plumbing, scheduling, descriptor validation.
///
/// Outcomes of running a command through the gate live in
/// [`crate::models::outcome::CommandError`] instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Not found error: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Invalid command descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Uuid error: {0}")]
    Uuid(#[from] uuid::Error),
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Parse(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Parse(s.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Parse(e.to_string())
    }
}

impl From<std::num::ParseFloatError> for Error {
    fn from(err: std::num::ParseFloatError) -> Self {
        Error::Parse(err.to_string())
    }
}
