// File: cmdgate-core/src/auth/permissions.rs

use std::collections::HashSet;

use dashmap::DashMap;
use uuid::Uuid;

use cmdgate_common::models::{Actor, CommandDescriptor, ExemptionKind};
use cmdgate_common::traits::PermissionOracle;

/// In-memory permission grants per player.
///
/// Nodes match exactly, through `*`, or through a `prefix.*` wildcard. Exemptions
/// are looked up as `<permission>.exempt.<warmup|cooldown|cost>`. Console and
/// automation actors hold every node.
#[derive(Default)]
pub struct StaticPermissions {
    grants: DashMap<Uuid, HashSet<String>>,
}

impl StaticPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&self, actor_id: Uuid, node: &str) {
        self.grants
            .entry(actor_id)
            .or_default()
            .insert(node.to_lowercase());
    }

    pub fn revoke(&self, actor_id: Uuid, node: &str) -> bool {
        self.grants
            .get_mut(&actor_id)
            .map(|mut set| set.remove(&node.to_lowercase()))
            .unwrap_or(false)
    }

    pub fn has(&self, actor: &Actor, node: &str) -> bool {
        if !actor.is_gated() {
            return true;
        }
        let Some(set) = self.grants.get(&actor.id) else {
            return false;
        };
        let node = node.to_lowercase();
        if set.contains("*") || set.contains(&node) {
            return true;
        }
        set.iter().any(|granted| {
            granted
                .strip_suffix(".*")
                .map(|prefix| node.starts_with(prefix) && node[prefix.len()..].starts_with('.'))
                .unwrap_or(false)
        })
    }

    pub fn exemption_node(descriptor: &CommandDescriptor, kind: ExemptionKind) -> String {
        format!("{}.exempt.{}", descriptor.permission, kind.as_str())
    }
}

impl PermissionOracle for StaticPermissions {
    fn has_base_permission(&self, actor: &Actor, descriptor: &CommandDescriptor) -> bool {
        self.has(actor, &descriptor.permission)
    }

    fn is_exempt(
        &self,
        actor: &Actor,
        descriptor: &CommandDescriptor,
        kind: ExemptionKind,
    ) -> bool {
        self.has(actor, &Self::exemption_node(descriptor, kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn home() -> CommandDescriptor {
        CommandDescriptor::builder("home").build().unwrap()
    }

    #[test]
    fn test_exact_and_wildcard_grants() {
        let perms = StaticPermissions::new();
        let alice = Actor::player(Uuid::new_v4(), "alice");
        assert!(!perms.has_base_permission(&alice, &home()));

        perms.grant(alice.id, "command.*");
        assert!(perms.has_base_permission(&alice, &home()));
        assert!(perms.is_exempt(&alice, &home(), ExemptionKind::Cost));

        assert!(perms.revoke(alice.id, "command.*"));
        perms.grant(alice.id, "command.home");
        assert!(perms.has_base_permission(&alice, &home()));
        assert!(!perms.is_exempt(&alice, &home(), ExemptionKind::Warmup));
    }

    #[test]
    fn test_wildcard_needs_a_dot_boundary() {
        let perms = StaticPermissions::new();
        let bob = Actor::player(Uuid::new_v4(), "bob");
        perms.grant(bob.id, "command.ho.*");
        assert!(!perms.has_base_permission(&bob, &home()));
    }

    #[test]
    fn test_console_has_everything() {
        let perms = StaticPermissions::new();
        assert!(perms.has_base_permission(&Actor::console(), &home()));
        assert!(perms.is_exempt(&Actor::console(), &home(), ExemptionKind::Cooldown));
    }

    #[test]
    fn test_exemption_node_format() {
        assert_eq!(
            StaticPermissions::exemption_node(&home(), ExemptionKind::Warmup),
            "command.home.exempt.warmup"
        );
    }
}
