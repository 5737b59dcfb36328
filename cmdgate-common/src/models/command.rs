// File: cmdgate-common/src/models/command.rs

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::models::actor::ActorKind;

/// Which actor kinds may run a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorConstraint {
    Any,
    PlayerOnly,
    ConsoleOnly,
    /// Console or automation, never a player.
    NonPlayer,
}

impl ActorConstraint {
    pub fn permits(&self, kind: ActorKind) -> bool {
        match self {
            ActorConstraint::Any => true,
            ActorConstraint::PlayerOnly => kind == ActorKind::Player,
            ActorConstraint::ConsoleOnly => kind == ActorKind::Console,
            ActorConstraint::NonPlayer => kind != ActorKind::Player,
        }
    }
}

/// The three gated axes a command or actor can be exempt from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExemptionKind {
    Warmup,
    Cooldown,
    Cost,
}

impl ExemptionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExemptionKind::Warmup => "warmup",
            ExemptionKind::Cooldown => "cooldown",
            ExemptionKind::Cost => "cost",
        }
    }
}

/// Static metadata for a command type. Built once at registration, shared read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDescriptor {
    /// First entry is the canonical name.
    pub aliases: Vec<String>,
    pub exempt_warmup: bool,
    pub exempt_cooldown: bool,
    pub exempt_cost: bool,
    pub actor_constraint: ActorConstraint,
    /// Key under which cost/cooldown/warmup settings are looked up.
    pub config_section: String,
    /// Base permission node required to run the command at all.
    pub permission: String,
    pub is_async: bool,
    pub description: String,
}

impl CommandDescriptor {
    pub fn builder(canonical: &str) -> CommandDescriptorBuilder {
        CommandDescriptorBuilder::new(canonical)
    }

    pub fn name(&self) -> &str {
        self.aliases.first().map(String::as_str).unwrap_or_default()
    }

    pub fn is_exempt(&self, kind: ExemptionKind) -> bool {
        match kind {
            ExemptionKind::Warmup => self.exempt_warmup,
            ExemptionKind::Cooldown => self.exempt_cooldown,
            ExemptionKind::Cost => self.exempt_cost,
        }
    }

    pub fn matches(&self, alias: &str) -> bool {
        self.aliases.iter().any(|a| a.eq_ignore_ascii_case(alias))
    }
}

#[derive(Debug, Clone)]
pub struct CommandDescriptorBuilder {
    aliases: Vec<String>,
    exempt_warmup: bool,
    exempt_cooldown: bool,
    exempt_cost: bool,
    actor_constraint: ActorConstraint,
    config_section: Option<String>,
    permission: Option<String>,
    is_async: bool,
    description: String,
}

impl CommandDescriptorBuilder {
    fn new(canonical: &str) -> Self {
        Self {
            aliases: vec![canonical.to_string()],
            exempt_warmup: false,
            exempt_cooldown: false,
            exempt_cost: false,
            actor_constraint: ActorConstraint::Any,
            config_section: None,
            permission: None,
            is_async: false,
            description: String::new(),
        }
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    pub fn no_warmup(mut self) -> Self {
        self.exempt_warmup = true;
        self
    }

    pub fn no_cooldown(mut self) -> Self {
        self.exempt_cooldown = true;
        self
    }

    pub fn no_cost(mut self) -> Self {
        self.exempt_cost = true;
        self
    }

    pub fn actors(mut self, constraint: ActorConstraint) -> Self {
        self.actor_constraint = constraint;
        self
    }

    pub fn config_section(mut self, section: &str) -> Self {
        self.config_section = Some(section.to_string());
        self
    }

    pub fn permission(mut self, node: &str) -> Self {
        self.permission = Some(node.to_string());
        self
    }

    pub fn run_async(mut self) -> Self {
        self.is_async = true;
        self
    }

    pub fn description(mut self, text: &str) -> Self {
        self.description = text.to_string();
        self
    }

    pub fn build(self) -> Result<CommandDescriptor, Error> {
        let mut seen: Vec<String> = Vec::with_capacity(self.aliases.len());
        for alias in &self.aliases {
            if alias.is_empty() {
                return Err(Error::InvalidDescriptor("alias must not be empty".into()));
            }
            if alias.chars().any(char::is_whitespace) {
                return Err(Error::InvalidDescriptor(format!(
                    "alias '{}' contains whitespace",
                    alias
                )));
            }
            let lower = alias.to_lowercase();
            if seen.contains(&lower) {
                return Err(Error::InvalidDescriptor(format!("duplicate alias '{}'", alias)));
            }
            seen.push(lower);
        }

        let canonical = self.aliases[0].to_lowercase();
        let config_section = self.config_section.unwrap_or_else(|| canonical.clone());
        if config_section.trim().is_empty() {
            return Err(Error::InvalidDescriptor(format!(
                "command '{}' has an empty config section",
                canonical
            )));
        }
        let permission = self
            .permission
            .unwrap_or_else(|| format!("command.{}", canonical));

        Ok(CommandDescriptor {
            aliases: self.aliases,
            exempt_warmup: self.exempt_warmup,
            exempt_cooldown: self.exempt_cooldown,
            exempt_cost: self.exempt_cost,
            actor_constraint: self.actor_constraint,
            config_section,
            permission,
            is_async: self.is_async,
            description: self.description,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let desc = CommandDescriptor::builder("home").alias("h").build().unwrap();
        assert_eq!(desc.name(), "home");
        assert_eq!(desc.config_section, "home");
        assert_eq!(desc.permission, "command.home");
        assert_eq!(desc.actor_constraint, ActorConstraint::Any);
        assert!(!desc.is_async);
        assert!(desc.matches("H"));
    }

    #[test]
    fn test_builder_rejects_bad_aliases() {
        assert!(CommandDescriptor::builder("").build().is_err());
        assert!(CommandDescriptor::builder("two words").build().is_err());
        assert!(CommandDescriptor::builder("home").alias("HOME").build().is_err());
    }

    #[test]
    fn test_builder_rejects_blank_section() {
        let res = CommandDescriptor::builder("home").config_section("  ").build();
        assert!(matches!(res, Err(Error::InvalidDescriptor(_))));
    }

    #[test]
    fn test_exemption_flags() {
        let desc = CommandDescriptor::builder("spawn")
            .no_warmup()
            .no_cost()
            .build()
            .unwrap();
        assert!(desc.is_exempt(ExemptionKind::Warmup));
        assert!(!desc.is_exempt(ExemptionKind::Cooldown));
        assert!(desc.is_exempt(ExemptionKind::Cost));
    }

    #[test]
    fn test_actor_constraints() {
        assert!(ActorConstraint::Any.permits(ActorKind::Automation));
        assert!(ActorConstraint::PlayerOnly.permits(ActorKind::Player));
        assert!(!ActorConstraint::PlayerOnly.permits(ActorKind::Console));
        assert!(!ActorConstraint::ConsoleOnly.permits(ActorKind::Automation));
        assert!(ActorConstraint::NonPlayer.permits(ActorKind::Automation));
        assert!(!ActorConstraint::NonPlayer.permits(ActorKind::Player));
    }
}
