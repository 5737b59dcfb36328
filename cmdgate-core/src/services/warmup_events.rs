// File: cmdgate-core/src/services/warmup_events.rs

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use cmdgate_common::models::{GateSettings, Position};

use crate::services::warmup_registry::WarmupRegistry;

/// Something an actor did that may void its pending warmup.
#[derive(Debug, Clone, PartialEq)]
pub enum ActorEvent {
    Moved {
        actor_id: Uuid,
        from: Position,
        to: Position,
    },
    CommandIssued {
        actor_id: Uuid,
    },
    Disconnected {
        actor_id: Uuid,
    },
}

impl ActorEvent {
    pub fn actor_id(&self) -> Uuid {
        match self {
            ActorEvent::Moved { actor_id, .. }
            | ActorEvent::CommandIssued { actor_id }
            | ActorEvent::Disconnected { actor_id } => *actor_id,
        }
    }
}

/// Turns actor events into `WarmupRegistry::cancel` calls.
#[derive(Clone)]
pub struct WarmupCanceller {
    registry: WarmupRegistry,
    settings: Arc<RwLock<GateSettings>>,
}

impl WarmupCanceller {
    pub fn new(registry: WarmupRegistry, settings: Arc<RwLock<GateSettings>>) -> Self {
        Self { registry, settings }
    }

    pub async fn on_move(&self, actor_id: Uuid, from: Position, to: Position) -> bool {
        let (enabled, tolerance) = {
            let settings = self.settings.read();
            (settings.cancel_warmup_on_move, settings.movement_tolerance)
        };
        if !enabled || from.distance(&to) <= tolerance {
            return false;
        }
        self.cancel(actor_id, "moved").await
    }

    /// Call before the new command enters the pipeline, so a command that itself
    /// arms a warmup does not cancel its own.
    pub async fn on_command(&self, actor_id: Uuid) -> bool {
        if !self.settings.read().cancel_warmup_on_command {
            return false;
        }
        self.cancel(actor_id, "issued another command").await
    }

    pub async fn on_disconnect(&self, actor_id: Uuid) -> bool {
        self.cancel(actor_id, "disconnected").await
    }

    pub async fn handle(&self, event: ActorEvent) -> bool {
        match event {
            ActorEvent::Moved { actor_id, from, to } => self.on_move(actor_id, from, to).await,
            ActorEvent::CommandIssued { actor_id } => self.on_command(actor_id).await,
            ActorEvent::Disconnected { actor_id } => self.on_disconnect(actor_id).await,
        }
    }

    async fn cancel(&self, actor_id: Uuid, reason: &str) -> bool {
        let cancelled = self.registry.cancel(actor_id).await;
        if cancelled {
            info!("Warmup for {} cancelled: actor {}", actor_id, reason);
        }
        cancelled
    }
}

/// Spawns a task that feeds every event from `rx` to the canceller until all
/// senders are dropped.
pub fn spawn_warmup_event_task(
    mut rx: mpsc::Receiver<ActorEvent>,
    canceller: WarmupCanceller,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let actor_id = event.actor_id();
            if !canceller.handle(event).await {
                debug!("Actor event for {} left warmups untouched", actor_id);
            }
        }
        debug!("Warmup event channel closed");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::helpers::{ManualClock, ManualScheduler};
    use cmdgate_common::traits::Task;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Fixture {
        registry: WarmupRegistry,
        settings: Arc<RwLock<GateSettings>>,
        canceller: WarmupCanceller,
        refunds: Arc<AtomicUsize>,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new());
        let scheduler = Arc::new(ManualScheduler::new(clock.clone()));
        let registry = WarmupRegistry::new(scheduler, clock);
        let settings = Arc::new(RwLock::new(GateSettings::default()));
        Fixture {
            canceller: WarmupCanceller::new(registry.clone(), settings.clone()),
            registry,
            settings,
            refunds: Arc::new(AtomicUsize::new(0)),
        }
    }

    impl Fixture {
        async fn arm(&self, actor_id: Uuid) {
            let refunds = self.refunds.clone();
            let on_cancel: Task = Box::pin(async move {
                refunds.fetch_add(1, Ordering::SeqCst);
            });
            self.registry
                .arm(
                    actor_id,
                    "home",
                    Duration::from_secs(10),
                    5.0,
                    Box::pin(async {}),
                    on_cancel,
                )
                .await;
        }
    }

    #[tokio::test]
    async fn test_small_moves_are_tolerated() {
        let f = fixture();
        let actor = Uuid::new_v4();
        f.arm(actor).await;

        let origin = Position::new(0.0, 64.0, 0.0);
        assert!(!f.canceller.on_move(actor, origin, Position::new(0.3, 64.0, 0.0)).await);
        assert!(f.canceller.on_move(actor, origin, Position::new(2.0, 64.0, 0.0)).await);
        assert_eq!(f.refunds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_toggles_are_respected() {
        let f = fixture();
        let actor = Uuid::new_v4();
        f.arm(actor).await;
        {
            let mut s = f.settings.write();
            s.cancel_warmup_on_move = false;
            s.cancel_warmup_on_command = false;
        }

        let far = Position::new(100.0, 0.0, 0.0);
        assert!(!f.canceller.on_move(actor, Position::default(), far).await);
        assert!(!f.canceller.on_command(actor).await);
        assert!(f.canceller.on_disconnect(actor).await, "disconnect always cancels");
        assert_eq!(f.refunds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_event_task_drains_channel() {
        let f = fixture();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        f.arm(a).await;
        f.arm(b).await;

        let (tx, rx) = mpsc::channel(8);
        let handle = spawn_warmup_event_task(rx, f.canceller.clone());
        tx.send(ActorEvent::CommandIssued { actor_id: a }).await.unwrap();
        tx.send(ActorEvent::Disconnected { actor_id: b }).await.unwrap();
        tx.send(ActorEvent::Disconnected { actor_id: b }).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(f.refunds.load(Ordering::SeqCst), 2);
        assert!(f.registry.is_empty());
    }
}
