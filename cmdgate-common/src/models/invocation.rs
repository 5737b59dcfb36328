// File: cmdgate-common/src/models/invocation.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::actor::Actor;
use crate::models::command::CommandDescriptor;

/// Argument flag that waives the cost of a single invocation.
pub const NO_COST_FLAG: &str = "--no-cost";

/// Raw arguments of one invocation. Parsing them is up to the command body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandArgs {
    raw: Vec<String>,
}

impl CommandArgs {
    pub fn new(raw: Vec<String>) -> Self {
        Self { raw }
    }

    pub fn parse(line: &str) -> Self {
        Self {
            raw: line.split_whitespace().map(str::to_string).collect(),
        }
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.raw.iter().any(|a| a.eq_ignore_ascii_case(flag))
    }

    /// Positional arguments, flags (anything starting with `--`) removed.
    pub fn positional(&self) -> Vec<&str> {
        self.raw
            .iter()
            .filter(|a| !a.starts_with("--"))
            .map(String::as_str)
            .collect()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.positional().get(index).copied()
    }

    pub fn raw(&self) -> &[String] {
        &self.raw
    }

    pub fn joined(&self) -> String {
        self.positional().join(" ")
    }
}

impl From<&str> for CommandArgs {
    fn from(line: &str) -> Self {
        Self::parse(line)
    }
}

/// A single request to run a command. Lives for one pipeline pass, or inside a
/// pending warmup until it fires or is cancelled.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub id: Uuid,
    pub actor: Actor,
    pub descriptor: Arc<CommandDescriptor>,
    pub args: CommandArgs,
    pub issued_at: DateTime<Utc>,
}

impl Invocation {
    pub fn new(
        actor: Actor,
        descriptor: Arc<CommandDescriptor>,
        args: CommandArgs,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor,
            descriptor,
            args,
            issued_at,
        }
    }

    pub fn command(&self) -> &str {
        self.descriptor.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_and_positional() {
        let args = CommandArgs::parse("bob  100 --no-cost");
        assert!(args.has_flag(NO_COST_FLAG));
        assert_eq!(args.positional(), vec!["bob", "100"]);
        assert_eq!(args.get(1), Some("100"));
        assert_eq!(args.get(2), None);
        assert_eq!(args.joined(), "bob 100");
    }

    #[test]
    fn test_empty_args() {
        let args = CommandArgs::parse("   ");
        assert!(args.raw().is_empty());
        assert!(!args.has_flag(NO_COST_FLAG));
    }
}
