// File: cmdgate-core/src/services/messages.rs
//! Text sent back to actors. One message per outcome.

use std::time::Duration;

use cmdgate_common::models::outcome::ceil_secs;
use cmdgate_common::models::{CommandDescriptor, CommandError};

pub const GENERIC_FAILURE: &str = "Something went wrong while running that command.";

pub fn for_error(descriptor: &CommandDescriptor, err: &CommandError) -> String {
    match err {
        CommandError::WrongActorKind => {
            format!("/{} cannot be run from here.", descriptor.name())
        }
        CommandError::Disabled => format!("/{} is currently disabled.", descriptor.name()),
        CommandError::PermissionDenied => {
            format!("You do not have permission to use /{}.", descriptor.name())
        }
        CommandError::PreCheckFailed(reason) => reason.clone(),
        CommandError::OnCooldown(remaining) => format!(
            "You must wait {} before using /{} again.",
            human_secs(remaining),
            descriptor.name()
        ),
        CommandError::InsufficientFunds => {
            format!("You cannot afford to use /{}.", descriptor.name())
        }
        CommandError::BodyFailure(message) => message.clone(),
        CommandError::UnexpectedFailure(_) => GENERIC_FAILURE.to_string(),
    }
}

pub fn warmup_started(descriptor: &CommandDescriptor, delay: &Duration) -> String {
    format!(
        "/{} will run in {}. Do not move or use other commands.",
        descriptor.name(),
        human_secs(delay)
    )
}

pub fn warmup_ended(descriptor: &CommandDescriptor) -> String {
    format!("Warmup finished. Running /{} now.", descriptor.name())
}

pub fn warmup_cancelled(descriptor: &CommandDescriptor, refunded: f64) -> String {
    if refunded > 0.0 {
        format!(
            "/{} was cancelled. {:.2} has been refunded.",
            descriptor.name(),
            refunded
        )
    } else {
        format!("/{} was cancelled.", descriptor.name())
    }
}

/// Generic text, plus the cause when debug output is on.
pub fn unexpected(cause: &str, debug: bool) -> String {
    if debug {
        format!("{} ({})", GENERIC_FAILURE, cause)
    } else {
        GENERIC_FAILURE.to_string()
    }
}

fn human_secs(d: &Duration) -> String {
    match ceil_secs(d) {
        1 => "1 second".to_string(),
        n => format!("{} seconds", n),
    }
}
