// File: cmdgate-core/src/services/actor_locks.rs

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// One async mutex per actor.
///
/// The guard is owned so it can travel into a spawned task: a gated invocation
/// holds it from the cooldown check until its post-execution bookkeeping is done.
/// Different actors never contend.
#[derive(Default)]
pub struct ActorLocks {
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

pub type ActorGuard = OwnedMutexGuard<()>;

impl ActorLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, actor_id: Uuid) -> ActorGuard {
        self.prune();
        let lock = self
            .locks
            .entry(actor_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Drops locks nobody holds or waits on.
    fn prune(&self) {
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
