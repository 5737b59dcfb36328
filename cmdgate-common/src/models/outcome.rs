// File: cmdgate-common/src/models/outcome.rs

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// How a command that got past the gate was handed off.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatched {
    /// The body ran inline and reported success.
    Completed,
    /// The body was submitted to an async worker; completion is only observable
    /// through its side effects.
    Accepted,
    /// A warmup was armed; the body runs when it fires.
    WarmupPending {
        fire_at: DateTime<Utc>,
        delay: Duration,
    },
}

/// Every way a pipeline pass can end without the body succeeding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("actor kind may not run this command")]
    WrongActorKind,

    #[error("command is disabled")]
    Disabled,

    #[error("permission denied")]
    PermissionDenied,

    #[error("pre-check failed: {0}")]
    PreCheckFailed(String),

    #[error("on cooldown for another {}s", ceil_secs(.0))]
    OnCooldown(Duration),

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("{0}")]
    BodyFailure(String),

    #[error("unexpected failure: {0}")]
    UnexpectedFailure(String),
}

impl CommandError {
    /// `OnCooldown` is "not yet", everything else is a real failure.
    pub fn is_failure(&self) -> bool {
        !matches!(self, CommandError::OnCooldown(_))
    }

    /// Whether the error came from the command body rather than the gate.
    pub fn from_body(&self) -> bool {
        matches!(
            self,
            CommandError::BodyFailure(_) | CommandError::UnexpectedFailure(_)
        )
    }
}

pub type ExecutionOutcome = Result<Dispatched, CommandError>;

/// Failure returned by a command body.
///
/// `Message` is a deliberate, user-facing condition; anything else lifts into
/// `Unexpected` through `?`.
#[derive(Debug, Error)]
pub enum CommandFailure {
    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl CommandFailure {
    pub fn message(text: impl Into<String>) -> Self {
        CommandFailure::Message(text.into())
    }
}

pub type BodyResult = Result<(), CommandFailure>;

/// Whole seconds, rounded up, so "0.2s left" never prints as zero.
pub fn ceil_secs(d: &Duration) -> u64 {
    let secs = d.as_secs();
    if d.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
