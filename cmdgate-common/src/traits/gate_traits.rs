// File: cmdgate-common/src/traits/gate_traits.rs
//! Collaborators the execution pipeline consumes but does not implement.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use uuid::Uuid;

use crate::error::Error;
use crate::models::{Actor, BodyResult, CommandDescriptor, ExemptionKind, Invocation};

/// A unit of work handed to a [`Scheduler`].
pub type Task = BoxFuture<'static, ()>;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub trait PermissionOracle: Send + Sync {
    fn has_base_permission(&self, actor: &Actor, descriptor: &CommandDescriptor) -> bool;

    fn is_exempt(&self, actor: &Actor, descriptor: &CommandDescriptor, kind: ExemptionKind)
        -> bool;
}

/// Numeric per-command settings, looked up by `CommandDescriptor::config_section`.
pub trait ConfigSource: Send + Sync {
    fn is_enabled(&self, _section: &str) -> bool {
        true
    }

    fn cooldown_seconds(&self, section: &str) -> i64;

    fn warmup_seconds(&self, section: &str) -> i64;

    fn cost(&self, section: &str) -> f64;
}

/// External economy. Each call must be atomic on its own; a failed charge must not
/// leave a partial debit behind.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// `Ok(false)` for insufficient funds or a missing account.
    async fn charge(&self, actor_id: Uuid, amount: f64) -> Result<bool, Error>;

    async fn refund(&self, actor_id: Uuid, amount: f64) -> Result<bool, Error>;
}

pub trait CancelHandle: Send + Sync {
    /// Best effort: a task that already started is not interrupted.
    fn cancel(&self);
}

pub trait Scheduler: Send + Sync {
    /// Queue onto the serial ("main thread") worker. Tasks queued here must not
    /// wait on an actor lock.
    fn run_now(&self, task: Task);

    /// Run on a background worker.
    fn run_async(&self, task: Task);

    /// Run on the serial worker once `delay` has elapsed.
    fn run_after(&self, delay: Duration, task: Task) -> Box<dyn CancelHandle>;
}

/// The business logic of a command.
#[async_trait]
pub trait CommandBody: Send + Sync {
    /// Validation that runs before any cost, cooldown or warmup state is touched.
    /// `Err` carries the reason shown to the actor.
    async fn pre_check(&self, _invocation: &Invocation) -> Result<(), String> {
        Ok(())
    }

    async fn execute(&self, invocation: &Invocation) -> BodyResult;
}

#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, actor: &Actor, text: &str);
}
