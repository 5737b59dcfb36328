// File: cmdgate-core/src/services/warmup_registry.rs
//! Pending delayed executions, at most one per actor.
//!
//! Each actor moves through `None -> Pending -> Firing -> None`, or
//! `Pending -> None` on cancel. The `Pending -> {Firing | None}` step is a single
//! `DashMap` removal, so whichever of `fire` and `cancel` removes the entry owns
//! it: exactly one of "the body runs" or "the refund happens" occurs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use cmdgate_common::traits::{CancelHandle, Clock, Scheduler, Task};

use crate::utils::time::{add_std, remaining};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmupState {
    None,
    Pending,
    Firing,
}

/// Public view of a pending warmup.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWarmup {
    /// Generation id; a stale timer carrying an old id never fires a newer entry.
    pub id: u64,
    pub actor_id: Uuid,
    pub command: String,
    pub fire_at: DateTime<Utc>,
    pub charged_cost: f64,
}

struct WarmupEntry {
    info: PendingWarmup,
    // Mutex only so the entry is Sync; the futures are moved out once, after removal.
    on_fire: Mutex<Task>,
    on_cancel: Mutex<Task>,
    timer: Option<Box<dyn CancelHandle>>,
}

impl WarmupEntry {
    fn stop_timer(&self) {
        if let Some(timer) = &self.timer {
            timer.cancel();
        }
    }
}

struct RegistryInner {
    entries: DashMap<Uuid, WarmupEntry>,
    firing: DashMap<Uuid, u64>,
    next_id: AtomicU64,
    scheduler: Arc<dyn Scheduler>,
    clock: Arc<dyn Clock>,
}

/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct WarmupRegistry {
    inner: Arc<RegistryInner>,
}

/// Clears the `Firing` marker even if the fire callback unwinds.
struct FiringMarker<'a> {
    firing: &'a DashMap<Uuid, u64>,
    actor_id: Uuid,
    id: u64,
}

impl Drop for FiringMarker<'_> {
    fn drop(&mut self) {
        self.firing.remove_if(&self.actor_id, |_, v| *v == self.id);
    }
}

impl WarmupRegistry {
    pub fn new(scheduler: Arc<dyn Scheduler>, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                entries: DashMap::new(),
                firing: DashMap::new(),
                next_id: AtomicU64::new(1),
                scheduler,
                clock,
            }),
        }
    }

    /// Installs a pending warmup that runs `on_fire` after `delay`.
    ///
    /// A previous pending entry for the same actor is cancelled first and its
    /// `on_cancel_refund` awaited, so it is never overwritten without compensation.
    pub async fn arm(
        &self,
        actor_id: Uuid,
        command: &str,
        delay: Duration,
        charged_cost: f64,
        on_fire: Task,
        on_cancel_refund: Task,
    ) -> PendingWarmup {
        if let Some((_, previous)) = self.inner.entries.remove(&actor_id) {
            info!(
                "Replacing pending warmup for '{}' of {} with '{}'",
                previous.info.command, actor_id, command
            );
            Self::compensate(previous).await;
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let info = PendingWarmup {
            id,
            actor_id,
            command: command.to_string(),
            fire_at: add_std(self.inner.clock.now(), delay),
            charged_cost,
        };
        let entry = WarmupEntry {
            info: info.clone(),
            on_fire: Mutex::new(on_fire),
            on_cancel: Mutex::new(on_cancel_refund),
            timer: None,
        };

        // Another arm may have slipped in while we awaited the refund above.
        if let Some(displaced) = self.inner.entries.insert(actor_id, entry) {
            Self::compensate(displaced).await;
        }

        let registry = self.clone();
        let timer = self.inner.scheduler.run_after(
            delay,
            Box::pin(async move {
                registry.fire_generation(actor_id, id).await;
            }),
        );
        match self.inner.entries.get_mut(&actor_id) {
            Some(mut entry) if entry.info.id == id => entry.timer = Some(timer),
            // Already cancelled or replaced; the stale timer would be a no-op anyway.
            _ => timer.cancel(),
        }

        info!(
            "Warmup armed: command='{}', actor={}, fires in {:?}",
            info.command, actor_id, delay
        );
        info
    }

    /// Cancels the actor's pending warmup and runs its refund callback.
    /// Returns `false` when nothing was pending.
    pub async fn cancel(&self, actor_id: Uuid) -> bool {
        match self.inner.entries.remove(&actor_id) {
            Some((_, entry)) => {
                info!(
                    "Warmup cancelled: command='{}', actor={}",
                    entry.info.command, actor_id
                );
                Self::compensate(entry).await;
                true
            }
            None => false,
        }
    }

    /// Fires whatever is pending for the actor right now. No-op if nothing is.
    pub async fn fire(&self, actor_id: Uuid) -> bool {
        match self.inner.entries.remove(&actor_id) {
            Some((_, entry)) => {
                self.run_fire(actor_id, entry).await;
                true
            }
            None => false,
        }
    }

    /// Timer callback: only fires the entry it was scheduled for.
    async fn fire_generation(&self, actor_id: Uuid, id: u64) {
        match self
            .inner
            .entries
            .remove_if(&actor_id, |_, entry| entry.info.id == id)
        {
            Some((_, entry)) => self.run_fire(actor_id, entry).await,
            None => debug!("Stale warmup timer #{} for {} ignored", id, actor_id),
        }
    }

    async fn run_fire(&self, actor_id: Uuid, entry: WarmupEntry) {
        let id = entry.info.id;
        entry.stop_timer();
        self.inner.firing.insert(actor_id, id);
        let _marker = FiringMarker {
            firing: &self.inner.firing,
            actor_id,
            id,
        };
        info!(
            "Warmup fired: command='{}', actor={}",
            entry.info.command, actor_id
        );
        entry.on_fire.into_inner().await;
    }

    async fn compensate(entry: WarmupEntry) {
        entry.stop_timer();
        entry.on_cancel.into_inner().await;
    }

    /// Cancels every pending warmup, e.g. on shutdown. Returns how many were cancelled.
    pub async fn cancel_all(&self) -> usize {
        let actors: Vec<Uuid> = self.inner.entries.iter().map(|e| *e.key()).collect();
        let mut cancelled = 0;
        for actor_id in actors {
            if self.cancel(actor_id).await {
                cancelled += 1;
            }
        }
        cancelled
    }

    pub fn state(&self, actor_id: Uuid) -> WarmupState {
        if self.inner.entries.contains_key(&actor_id) {
            WarmupState::Pending
        } else if self.inner.firing.contains_key(&actor_id) {
            WarmupState::Firing
        } else {
            WarmupState::None
        }
    }

    pub fn pending(&self, actor_id: Uuid) -> Option<PendingWarmup> {
        self.inner.entries.get(&actor_id).map(|e| e.info.clone())
    }

    /// Time until the actor's pending warmup fires.
    pub fn remaining(&self, actor_id: Uuid) -> Option<Duration> {
        let fire_at = self.inner.entries.get(&actor_id).map(|e| e.info.fire_at)?;
        remaining(self.inner.clock.now(), fire_at)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }
}
