// File: cmdgate-core/src/services/cost_policy.rs

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use cmdgate_common::models::{Actor, ExemptionKind, Invocation, NO_COST_FLAG};
use cmdgate_common::traits::{ConfigSource, Ledger, PermissionOracle};

/// Proof that an amount was debited for one invocation.
///
/// Consumed exactly once, either by [`CostPolicy::refund`] or by [`Charge::settle`]
/// once the command has completed, so a double refund cannot be written.
#[must_use = "a charge must be refunded or settled"]
#[derive(Debug)]
pub struct Charge {
    actor_id: Uuid,
    amount: f64,
    resolved: bool,
}

impl Charge {
    fn new(actor_id: Uuid, amount: f64) -> Self {
        Self {
            actor_id,
            amount,
            resolved: false,
        }
    }

    pub fn actor_id(&self) -> Uuid {
        self.actor_id
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn is_free(&self) -> bool {
        self.amount <= 0.0
    }

    /// The command completed; the money stays spent.
    pub fn settle(mut self) {
        self.resolved = true;
    }
}

impl Drop for Charge {
    fn drop(&mut self) {
        if !self.resolved && !self.is_free() {
            warn!(
                "Charge of {:.2} for {} dropped without settle or refund",
                self.amount, self.actor_id
            );
        }
    }
}

/// Works out what an invocation costs and moves money through the ledger.
pub struct CostPolicy {
    ledger: Arc<dyn Ledger>,
    config: Arc<dyn ConfigSource>,
    permissions: Arc<dyn PermissionOracle>,
}

impl CostPolicy {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        config: Arc<dyn ConfigSource>,
        permissions: Arc<dyn PermissionOracle>,
    ) -> Self {
        Self {
            ledger,
            config,
            permissions,
        }
    }

    /// 0 for exempt actors (permission, `--no-cost` flag, descriptor flag, ungated
    /// kind), otherwise the configured cost for the command's section, clamped at 0.
    pub fn compute_cost(&self, invocation: &Invocation) -> f64 {
        let actor = &invocation.actor;
        let descriptor = invocation.descriptor.as_ref();

        if !actor.is_gated()
            || descriptor.exempt_cost
            || invocation.args.has_flag(NO_COST_FLAG)
            || self
                .permissions
                .is_exempt(actor, descriptor, ExemptionKind::Cost)
        {
            return 0.0;
        }

        let cost = self.config.cost(&descriptor.config_section);
        if cost.is_finite() && cost > 0.0 {
            cost
        } else {
            0.0
        }
    }

    /// Debits `amount`. `None` means the ledger refused (insufficient funds, no
    /// account, or a ledger error) and nothing was taken.
    pub async fn charge(&self, actor: &Actor, amount: f64) -> Option<Charge> {
        if amount <= 0.0 {
            return Some(Charge::new(actor.id, 0.0));
        }
        match self.ledger.charge(actor.id, amount).await {
            Ok(true) => {
                debug!("Charged {} {:.2}", actor.name, amount);
                Some(Charge::new(actor.id, amount))
            }
            Ok(false) => None,
            Err(e) => {
                warn!("Ledger error charging {} {:.2}: {:?}", actor.name, amount, e);
                None
            }
        }
    }

    /// Returns the money. Failures are logged, never propagated.
    pub async fn refund(&self, mut charge: Charge) {
        charge.resolved = true;
        if charge.is_free() {
            return;
        }
        match self.ledger.refund(charge.actor_id, charge.amount).await {
            Ok(true) => debug!("Refunded {:.2} to {}", charge.amount, charge.actor_id),
            Ok(false) => warn!(
                "Refund of {:.2} to {} was refused by the ledger",
                charge.amount, charge.actor_id
            ),
            Err(e) => warn!(
                "Refund of {:.2} to {} failed: {:?}",
                charge.amount, charge.actor_id, e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::permissions::StaticPermissions;
    use crate::test_utils::helpers::{FixedConfig, RecordingLedger};
    use chrono::Utc;
    use cmdgate_common::models::{CommandArgs, CommandDescriptor};

    fn invocation(actor: Actor, desc: CommandDescriptor, args: &str) -> Invocation {
        Invocation::new(actor, Arc::new(desc), CommandArgs::parse(args), Utc::now())
    }

    fn policy(cost: f64) -> (CostPolicy, Arc<RecordingLedger>, Arc<StaticPermissions>) {
        let ledger = Arc::new(RecordingLedger::new());
        let perms = Arc::new(StaticPermissions::new());
        let policy = CostPolicy::new(
            ledger.clone(),
            Arc::new(FixedConfig::new(0, 0, cost)),
            perms.clone(),
        );
        (policy, ledger, perms)
    }

    #[test]
    fn test_compute_cost_uses_config() {
        let (policy, _, _) = policy(5.0);
        let desc = CommandDescriptor::builder("home").build().unwrap();
        let inv = invocation(Actor::player(Uuid::new_v4(), "alice"), desc, "");
        assert_eq!(policy.compute_cost(&inv), 5.0);
    }

    #[test]
    fn test_exempt_actors_pay_nothing() {
        let (policy, _, perms) = policy(5.0);
        let desc = CommandDescriptor::builder("home").build().unwrap();
        let alice = Actor::player(Uuid::new_v4(), "alice");

        let no_cost_desc = CommandDescriptor::builder("home").no_cost().build().unwrap();
        assert_eq!(policy.compute_cost(&invocation(alice.clone(), no_cost_desc, "")), 0.0);
        assert_eq!(
            policy.compute_cost(&invocation(alice.clone(), desc.clone(), "--no-cost")),
            0.0
        );
        assert_eq!(policy.compute_cost(&invocation(Actor::console(), desc.clone(), "")), 0.0);

        perms.grant(alice.id, "command.home.exempt.cost");
        assert_eq!(policy.compute_cost(&invocation(alice, desc, "")), 0.0);
    }

    #[test]
    fn test_non_positive_config_is_free() {
        let (policy, _, _) = policy(-2.0);
        let desc = CommandDescriptor::builder("home").build().unwrap();
        let inv = invocation(Actor::player(Uuid::new_v4(), "alice"), desc, "");
        assert_eq!(policy.compute_cost(&inv), 0.0);
    }

    #[tokio::test]
    async fn test_charge_then_refund_once() {
        let (policy, ledger, _) = policy(5.0);
        let alice = Actor::player(Uuid::new_v4(), "alice");
        ledger.deposit(alice.id, 20.0);

        let charge = policy.charge(&alice, 5.0).await.expect("charge should succeed");
        assert_eq!(ledger.balance(alice.id), Some(15.0));
        policy.refund(charge).await;
        assert_eq!(ledger.balance(alice.id), Some(20.0));
        assert_eq!(ledger.refunds(), vec![(alice.id, 5.0)]);
    }

    #[tokio::test]
    async fn test_refused_charge_takes_nothing() {
        let (policy, ledger, _) = policy(5.0);
        let alice = Actor::player(Uuid::new_v4(), "alice");
        ledger.deposit(alice.id, 1.0);

        assert!(policy.charge(&alice, 5.0).await.is_none());
        assert_eq!(ledger.balance(alice.id), Some(1.0));
    }

    #[tokio::test]
    async fn test_free_charge_skips_ledger() {
        let (policy, ledger, _) = policy(0.0);
        let alice = Actor::player(Uuid::new_v4(), "alice");
        let charge = policy.charge(&alice, 0.0).await.expect("free charge");
        assert!(charge.is_free());
        policy.refund(charge).await;
        assert!(ledger.charges().is_empty());
        assert!(ledger.refunds().is_empty());
    }
}
