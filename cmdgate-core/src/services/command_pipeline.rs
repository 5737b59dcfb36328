// File: cmdgate-core/src/services/command_pipeline.rs
//! Runs a resolved command invocation through the gate:
//!
//! 1. actor-type check
//! 2. enabled switch and base permission
//! 3. the body's pre-check
//! 4. gated actors only: cooldown check, cost charge, warmup
//! 5. dispatch, inline or on an async worker
//! 6. post-execution: arm cooldown on success, refund on failure
//!
//! Stages short-circuit on the first outcome that is not "continue".

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use cmdgate_common::models::{
    Actor, CommandArgs, CommandDescriptor, CommandError, CommandFailure, Dispatched,
    ExecutionOutcome, ExemptionKind, GateSettings, Invocation,
};
use cmdgate_common::traits::{
    Clock, CommandBody, ConfigSource, Ledger, Messenger, PermissionOracle, Scheduler,
};

use crate::services::actor_locks::{ActorGuard, ActorLocks};
use crate::services::cooldown_store::CooldownStore;
use crate::services::cost_policy::{Charge, CostPolicy};
use crate::services::messages;
use crate::services::warmup_events::WarmupCanceller;
use crate::services::warmup_registry::WarmupRegistry;
use crate::utils::time::positive_secs;

/// A command as registered with the runtime: its metadata and its body.
#[derive(Clone)]
pub struct RegisteredCommand {
    pub descriptor: Arc<CommandDescriptor>,
    pub body: Arc<dyn CommandBody>,
}

impl RegisteredCommand {
    pub fn new(descriptor: CommandDescriptor, body: impl CommandBody + 'static) -> Self {
        Self {
            descriptor: Arc::new(descriptor),
            body: Arc::new(body),
        }
    }

    pub fn from_parts(descriptor: Arc<CommandDescriptor>, body: Arc<dyn CommandBody>) -> Self {
        Self { descriptor, body }
    }
}

/// Everything the pipeline talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub permissions: Arc<dyn PermissionOracle>,
    pub config: Arc<dyn ConfigSource>,
    pub ledger: Arc<dyn Ledger>,
    pub messenger: Arc<dyn Messenger>,
    pub scheduler: Arc<dyn Scheduler>,
    pub clock: Arc<dyn Clock>,
}

/// What stage 4 resolved to for one gated invocation.
#[derive(Debug, Clone, Copy)]
struct Gate {
    /// Cooldown store is consulted at all.
    cooldown_applies: bool,
    /// Duration to arm on success.
    cooldown: Option<Duration>,
    warmup: Option<Duration>,
    cost: f64,
}

struct PipelineInner {
    permissions: Arc<dyn PermissionOracle>,
    config: Arc<dyn ConfigSource>,
    messenger: Arc<dyn Messenger>,
    scheduler: Arc<dyn Scheduler>,
    clock: Arc<dyn Clock>,
    cost: CostPolicy,
    cooldowns: CooldownStore,
    warmups: WarmupRegistry,
    locks: ActorLocks,
    settings: Arc<RwLock<GateSettings>>,
}

/// The orchestrator. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct CommandPipeline {
    inner: Arc<PipelineInner>,
}

impl CommandPipeline {
    pub fn new(collaborators: Collaborators, settings: GateSettings) -> Self {
        let Collaborators {
            permissions,
            config,
            ledger,
            messenger,
            scheduler,
            clock,
        } = collaborators;

        debug!("Initializing CommandPipeline (debug={})", settings.debug);
        Self {
            inner: Arc::new(PipelineInner {
                cost: CostPolicy::new(ledger, config.clone(), permissions.clone()),
                cooldowns: CooldownStore::new(clock.clone()),
                warmups: WarmupRegistry::new(scheduler.clone(), clock.clone()),
                locks: ActorLocks::new(),
                settings: Arc::new(RwLock::new(settings)),
                permissions,
                config,
                messenger,
                scheduler,
                clock,
            }),
        }
    }

    pub fn cooldowns(&self) -> &CooldownStore {
        &self.inner.cooldowns
    }

    pub fn warmups(&self) -> &WarmupRegistry {
        &self.inner.warmups
    }

    pub fn cost_policy(&self) -> &CostPolicy {
        &self.inner.cost
    }

    pub fn settings(&self) -> GateSettings {
        self.inner.settings.read().clone()
    }

    pub fn set_settings(&self, settings: GateSettings) {
        *self.inner.settings.write() = settings;
    }

    /// A canceller over this pipeline's warmups that follows its settings.
    pub fn canceller(&self) -> WarmupCanceller {
        WarmupCanceller::new(self.inner.warmups.clone(), self.inner.settings.clone())
    }

    /// Runs one invocation of `command` by `actor`.
    ///
    /// Returns once the invocation reaches a suspend point: the body finished
    /// inline, was handed to an async worker, or a warmup was armed. Every error
    /// has already been reported to the actor through the messenger.
    pub async fn execute(
        &self,
        command: &RegisteredCommand,
        actor: Actor,
        args: CommandArgs,
    ) -> ExecutionOutcome {
        let invocation = Invocation::new(
            actor,
            command.descriptor.clone(),
            args,
            self.inner.clock.now(),
        );
        self.execute_invocation(command.body.clone(), invocation)
            .await
    }

    pub async fn execute_invocation(
        &self,
        body: Arc<dyn CommandBody>,
        invocation: Invocation,
    ) -> ExecutionOutcome {
        let descriptor = invocation.descriptor.clone();
        let actor = invocation.actor.clone();
        debug!(
            "Pipeline: '{}' by {} ({}) args={:?}",
            descriptor.name(),
            actor.name,
            actor.kind.as_str(),
            invocation.args.raw()
        );

        if !descriptor.actor_constraint.permits(actor.kind) {
            return self.reject(&invocation, CommandError::WrongActorKind).await;
        }
        if !self.inner.config.is_enabled(&descriptor.config_section) {
            return self.reject(&invocation, CommandError::Disabled).await;
        }
        if !self.inner.permissions.has_base_permission(&actor, &descriptor) {
            return self.reject(&invocation, CommandError::PermissionDenied).await;
        }
        if let Err(reason) = body.pre_check(&invocation).await {
            return self
                .reject(&invocation, CommandError::PreCheckFailed(reason))
                .await;
        }

        if !actor.is_gated() {
            return self.dispatch(body, invocation, None, None, None).await;
        }

        let guard = self.inner.locks.lock(actor.id).await;
        let gate = self.resolve_gate(&invocation);

        if gate.cooldown_applies {
            if let Some(remaining) = self
                .inner
                .cooldowns
                .is_on_cooldown(descriptor.name(), actor.id)
            {
                drop(guard);
                return self
                    .reject(&invocation, CommandError::OnCooldown(remaining))
                    .await;
            }
        }

        let charge = if gate.cost > 0.0 {
            match self.inner.cost.charge(&actor, gate.cost).await {
                Some(charge) => Some(charge),
                None => {
                    drop(guard);
                    return self
                        .reject(&invocation, CommandError::InsufficientFunds)
                        .await;
                }
            }
        } else {
            None
        };

        if let Some(delay) = gate.warmup {
            let outcome = self.arm_warmup(body, invocation, charge, gate, delay).await;
            drop(guard);
            return outcome;
        }

        self.dispatch(body, invocation, charge, gate.cooldown, Some(guard))
            .await
    }

    fn resolve_gate(&self, invocation: &Invocation) -> Gate {
        let actor = &invocation.actor;
        let descriptor = invocation.descriptor.as_ref();
        let section = descriptor.config_section.as_str();
        let exempt = |kind: ExemptionKind| {
            descriptor.is_exempt(kind) || self.inner.permissions.is_exempt(actor, descriptor, kind)
        };

        let cooldown_applies = !exempt(ExemptionKind::Cooldown);
        let cooldown = if cooldown_applies {
            positive_secs(self.inner.config.cooldown_seconds(section))
        } else {
            None
        };
        let warmup = if exempt(ExemptionKind::Warmup) {
            None
        } else {
            positive_secs(self.inner.config.warmup_seconds(section))
        };

        Gate {
            cooldown_applies,
            cooldown,
            warmup,
            cost: self.inner.cost.compute_cost(invocation),
        }
    }

    /// Stage 4c: park the invocation in the warmup registry. The charge moves into
    /// a slot that exactly one of the fire/cancel callbacks will take.
    async fn arm_warmup(
        &self,
        body: Arc<dyn CommandBody>,
        invocation: Invocation,
        charge: Option<Charge>,
        gate: Gate,
        delay: Duration,
    ) -> ExecutionOutcome {
        let descriptor = invocation.descriptor.clone();
        let actor = invocation.actor.clone();
        let charged = charge.as_ref().map(Charge::amount).unwrap_or(0.0);
        let slot = Arc::new(Mutex::new(charge));

        // Runs on the serial worker, which must never wait on an actor lock.
        let on_fire = {
            let pipeline = self.clone();
            let slot = slot.clone();
            Box::pin(async move {
                let fired = pipeline.clone();
                pipeline.inner.scheduler.run_async(Box::pin(async move {
                    fired.fire_warmup(body, invocation, slot, gate).await;
                }));
            })
        };

        let on_cancel = {
            let pipeline = self.clone();
            let descriptor = descriptor.clone();
            let actor = actor.clone();
            Box::pin(async move {
                let charge = slot.lock().take();
                let refunded = charge.as_ref().map(Charge::amount).unwrap_or(0.0);
                if let Some(charge) = charge {
                    pipeline.inner.cost.refund(charge).await;
                }
                pipeline
                    .inner
                    .messenger
                    .send(&actor, &messages::warmup_cancelled(&descriptor, refunded))
                    .await;
            })
        };

        let pending = self
            .inner
            .warmups
            .arm(actor.id, descriptor.name(), delay, charged, on_fire, on_cancel)
            .await;

        self.inner
            .messenger
            .send(&actor, &messages::warmup_started(&descriptor, &delay))
            .await;

        Ok(Dispatched::WarmupPending {
            fire_at: pending.fire_at,
            delay,
        })
    }

    /// Second half of a warmup that ran out. The actor lock is taken again and the
    /// cooldown re-checked, since an invocation that held the lock while the timer
    /// fired may have armed it in between.
    async fn fire_warmup(
        &self,
        body: Arc<dyn CommandBody>,
        invocation: Invocation,
        slot: Arc<Mutex<Option<Charge>>>,
        gate: Gate,
    ) {
        let guard = self.inner.locks.lock(invocation.actor.id).await;
        let charge = slot.lock().take();

        if gate.cooldown_applies {
            if let Some(remaining) = self
                .inner
                .cooldowns
                .is_on_cooldown(invocation.command(), invocation.actor.id)
            {
                drop(guard);
                if let Some(charge) = charge {
                    self.inner.cost.refund(charge).await;
                }
                let _ = self
                    .reject(&invocation, CommandError::OnCooldown(remaining))
                    .await;
                return;
            }
        }

        self.inner
            .messenger
            .send(
                &invocation.actor,
                &messages::warmup_ended(&invocation.descriptor),
            )
            .await;

        if invocation.descriptor.is_async {
            let _ = self
                .dispatch(body, invocation, charge, gate.cooldown, Some(guard))
                .await;
            return;
        }

        // Sync bodies still run on the serial worker, with the lock already held.
        let pipeline = self.clone();
        self.inner.scheduler.run_now(Box::pin(async move {
            let _ = pipeline
                .dispatch(body, invocation, charge, gate.cooldown, Some(guard))
                .await;
        }));
    }

    /// Stage 5. `guard` (if any) is released only after post-execution bookkeeping.
    async fn dispatch(
        &self,
        body: Arc<dyn CommandBody>,
        invocation: Invocation,
        charge: Option<Charge>,
        cooldown: Option<Duration>,
        guard: Option<ActorGuard>,
    ) -> ExecutionOutcome {
        if invocation.descriptor.is_async {
            let pipeline = self.clone();
            debug!(
                "Dispatching '{}' for {} to async worker",
                invocation.command(),
                invocation.actor.name
            );
            self.inner.scheduler.run_async(Box::pin(async move {
                let _ = pipeline.complete(body, invocation, charge, cooldown).await;
                drop(guard);
            }));
            return Ok(Dispatched::Accepted);
        }

        let result = self.complete(body, invocation, charge, cooldown).await;
        drop(guard);
        result.map(|_| Dispatched::Completed)
    }

    /// Runs the body and applies stage 6.
    async fn complete(
        &self,
        body: Arc<dyn CommandBody>,
        invocation: Invocation,
        charge: Option<Charge>,
        cooldown: Option<Duration>,
    ) -> Result<(), CommandError> {
        let caught = AssertUnwindSafe(body.execute(&invocation))
            .catch_unwind()
            .await;

        let result = match caught {
            Ok(Ok(())) => Ok(()),
            Ok(Err(CommandFailure::Message(message))) => Err(CommandError::BodyFailure(message)),
            Ok(Err(CommandFailure::Unexpected(cause))) => {
                self.log_unexpected(&invocation, &format!("{:?}", cause));
                Err(CommandError::UnexpectedFailure(cause.to_string()))
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                self.log_unexpected(&invocation, &format!("panic: {}", message));
                Err(CommandError::UnexpectedFailure(message))
            }
        };

        match &result {
            Ok(()) => {
                if let Some(duration) = cooldown {
                    self.inner
                        .cooldowns
                        .arm(invocation.command(), invocation.actor.id, duration);
                }
                if let Some(charge) = charge {
                    charge.settle();
                }
                debug!(
                    "'{}' by {} completed",
                    invocation.command(),
                    invocation.actor.name
                );
            }
            Err(err) => {
                if let CommandError::BodyFailure(message) = err {
                    warn!(
                        "'{}' by {} failed: {}",
                        invocation.command(),
                        invocation.actor.name,
                        message
                    );
                }
                if let Some(charge) = charge {
                    self.inner.cost.refund(charge).await;
                }
                self.notify(&invocation, err).await;
            }
        }
        result
    }

    async fn reject(&self, invocation: &Invocation, err: CommandError) -> ExecutionOutcome {
        debug!(
            "'{}' by {} rejected: {}",
            invocation.command(),
            invocation.actor.name,
            err
        );
        self.notify(invocation, &err).await;
        Err(err)
    }

    async fn notify(&self, invocation: &Invocation, err: &CommandError) {
        let text = match err {
            CommandError::UnexpectedFailure(cause) => {
                messages::unexpected(cause, self.inner.settings.read().debug)
            }
            other => messages::for_error(&invocation.descriptor, other),
        };
        self.inner.messenger.send(&invocation.actor, &text).await;
    }

    fn log_unexpected(&self, invocation: &Invocation, detail: &str) {
        if self.inner.settings.read().debug {
            error!(
                "'{}' by {} failed unexpectedly: {}",
                invocation.command(),
                invocation.actor.name,
                detail
            );
        } else {
            warn!(
                "'{}' by {} failed unexpectedly (enable debug for details)",
                invocation.command(),
                invocation.actor.name
            );
        }
    }

    /// Cancels every pending warmup with refunds. Call before shutting down.
    pub async fn shutdown(&self) {
        let cancelled = self.inner.warmups.cancel_all().await;
        info!("CommandPipeline shut down, {} pending warmup(s) refunded", cancelled);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "command body panicked".to_string()
    }
}
