// File: cmdgate-core/tests/warmup_tests.rs

mod test_utils;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use uuid::Uuid;

use cmdgate_common::models::{Actor, CommandArgs, CommandError, Dispatched, Position};
use cmdgate_common::traits::Ledger;
use cmdgate_common::Error;
use cmdgate_core::auth::StaticPermissions;
use cmdgate_core::repositories::InMemoryLedger;
use cmdgate_core::services::WarmupState;
use cmdgate_core::test_utils::helpers::{BodyScript, FixedConfig, ScriptedBody};

use test_utils::{command, descriptor, pipeline_with, Harness};

/// Ledger whose next charge parks until the test lets it through.
struct HeldLedger {
    inner: InMemoryLedger,
    hold_next: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl HeldLedger {
    fn new() -> Self {
        Self {
            inner: InMemoryLedger::new(),
            hold_next: AtomicBool::new(false),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl Ledger for HeldLedger {
    async fn charge(&self, actor_id: Uuid, amount: f64) -> Result<bool, Error> {
        if self.hold_next.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.charge(actor_id, amount).await
    }

    async fn refund(&self, actor_id: Uuid, amount: f64) -> Result<bool, Error> {
        self.inner.refund(actor_id, amount).await
    }
}

#[tokio::test]
async fn test_movement_cancels_warmup_and_refunds() {
    let h = Harness::new(FixedConfig::new(0, 10, 5.0));
    let body = Arc::new(ScriptedBody::succeeding());
    let home = command(descriptor("home"), body.clone());
    let alice = h.player("alice", &["command.home"]);
    h.ledger.deposit(alice.id, 20.0);
    let canceller = h.pipeline.canceller();

    let outcome = h.pipeline.execute(&home, alice.clone(), CommandArgs::default()).await;
    match outcome {
        Ok(Dispatched::WarmupPending { delay, .. }) => assert_eq!(delay, Duration::from_secs(10)),
        other => panic!("expected a pending warmup, got {:?}", other),
    }
    assert_eq!(h.ledger.balance(alice.id), Some(15.0));
    assert_eq!(h.pipeline.warmups().state(alice.id), WarmupState::Pending);

    h.scheduler.advance(Duration::from_secs(3)).await;
    let moved = canceller
        .on_move(alice.id, Position::new(0.0, 64.0, 0.0), Position::new(3.0, 64.0, 0.0))
        .await;
    assert!(moved);

    h.scheduler.advance(Duration::from_secs(20)).await;
    assert_eq!(body.runs(), 0);
    assert_eq!(h.ledger.refunds(), vec![(alice.id, 5.0)]);
    assert_eq!(h.ledger.balance(alice.id), Some(20.0));
    assert_eq!(
        h.messenger.messages_for(alice.id),
        vec![
            "/home will run in 10 seconds. Do not move or use other commands.".to_string(),
            "/home was cancelled. 5.00 has been refunded.".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_fired_warmup_arms_cooldown_from_fire_time() {
    let h = Harness::new(FixedConfig::new(30, 10, 5.0));
    let body = Arc::new(ScriptedBody::succeeding());
    let home = command(descriptor("home"), body.clone());
    let alice = h.player("alice", &["command.home"]);
    h.ledger.deposit(alice.id, 20.0);

    let _ = h.pipeline.execute(&home, alice.clone(), CommandArgs::default()).await;
    assert!(h.pipeline.cooldowns().is_on_cooldown("home", alice.id).is_none());

    h.scheduler.advance(Duration::from_secs(10)).await;
    assert_eq!(body.runs(), 1);
    assert_eq!(h.pipeline.warmups().state(alice.id), WarmupState::None);
    assert_eq!(
        h.messenger.messages_for(alice.id),
        vec![
            "/home will run in 10 seconds. Do not move or use other commands.".to_string(),
            "Warmup finished. Running /home now.".to_string(),
        ]
    );
    assert_eq!(
        h.pipeline.cooldowns().is_on_cooldown("home", alice.id),
        Some(Duration::from_secs(30))
    );
    assert!(h.ledger.refunds().is_empty());
    assert_eq!(h.ledger.balance(alice.id), Some(15.0));

    h.scheduler.advance(Duration::from_secs(29)).await;
    let outcome = h.pipeline.execute(&home, alice.clone(), CommandArgs::default()).await;
    assert_eq!(outcome, Err(CommandError::OnCooldown(Duration::from_secs(1))));
}

#[tokio::test]
async fn test_fired_body_failure_refunds_without_cooldown() {
    let h = Harness::new(FixedConfig::new(30, 10, 5.0));
    let body = Arc::new(ScriptedBody::new(BodyScript::FailWith("Home is obstructed.".into())));
    let home = command(descriptor("home"), body.clone());
    let alice = h.player("alice", &["command.home"]);
    h.ledger.deposit(alice.id, 5.0);

    let _ = h.pipeline.execute(&home, alice.clone(), CommandArgs::default()).await;
    h.scheduler.advance(Duration::from_secs(10)).await;

    assert_eq!(body.runs(), 1);
    assert_eq!(h.ledger.refunds(), vec![(alice.id, 5.0)]);
    assert!(h.pipeline.cooldowns().is_empty());
    let messages = h.messenger.messages_for(alice.id);
    assert_eq!(messages.last().map(String::as_str), Some("Home is obstructed."));
}

#[tokio::test]
async fn test_rearm_refunds_previous_warmup() {
    let h = Harness::new(FixedConfig::new(0, 10, 5.0));
    let home_body = Arc::new(ScriptedBody::succeeding());
    let spawn_body = Arc::new(ScriptedBody::succeeding());
    let home = command(descriptor("home"), home_body.clone());
    let spawn = command(descriptor("spawn"), spawn_body.clone());
    let alice = h.player("alice", &["command.home", "command.spawn"]);
    h.ledger.deposit(alice.id, 20.0);

    let _ = h.pipeline.execute(&home, alice.clone(), CommandArgs::default()).await;
    h.scheduler.advance(Duration::from_secs(4)).await;
    let _ = h.pipeline.execute(&spawn, alice.clone(), CommandArgs::default()).await;

    assert_eq!(h.pipeline.warmups().len(), 1);
    assert_eq!(h.ledger.refunds(), vec![(alice.id, 5.0)]);
    assert_eq!(h.ledger.balance(alice.id), Some(15.0));

    h.scheduler.advance(Duration::from_secs(10)).await;
    assert_eq!(home_body.runs(), 0);
    assert_eq!(spawn_body.runs(), 1);
}

#[tokio::test]
async fn test_other_command_and_disconnect_cancel() {
    let h = Harness::new(FixedConfig::new(0, 10, 0.0));
    let body = Arc::new(ScriptedBody::succeeding());
    let home = command(descriptor("home"), body.clone());
    let alice = h.player("alice", &["command.home"]);
    let bob = h.player("bob", &["command.home"]);
    let canceller = h.pipeline.canceller();

    let _ = h.pipeline.execute(&home, alice.clone(), CommandArgs::default()).await;
    let _ = h.pipeline.execute(&home, bob.clone(), CommandArgs::default()).await;

    assert!(canceller.on_command(alice.id).await);
    assert!(canceller.on_disconnect(bob.id).await);
    assert!(!canceller.on_disconnect(bob.id).await);

    h.scheduler.advance(Duration::from_secs(30)).await;
    assert_eq!(body.runs(), 0);
    assert!(h.ledger.refunds().is_empty(), "free warmups refund nothing");
    assert_eq!(
        h.messenger.messages_for(alice.id).last().map(String::as_str),
        Some("/home was cancelled.")
    );
}

#[tokio::test]
async fn test_shutdown_refunds_pending_warmups() {
    let h = Harness::new(FixedConfig::new(0, 10, 5.0));
    let home = command(descriptor("home"), Arc::new(ScriptedBody::succeeding()));
    let alice = h.player("alice", &["command.home"]);
    h.ledger.deposit(alice.id, 5.0);

    let _ = h.pipeline.execute(&home, alice.clone(), CommandArgs::default()).await;
    assert_eq!(h.ledger.balance(alice.id), Some(0.0));

    h.pipeline.shutdown().await;
    assert_eq!(h.ledger.balance(alice.id), Some(5.0));
    assert!(h.pipeline.warmups().is_empty());
}

#[tokio::test]
async fn test_fire_and_cancel_race_resolves_once() {
    for _ in 0..100 {
        let h = Harness::new(FixedConfig::new(0, 10, 5.0));
        let body = Arc::new(ScriptedBody::succeeding());
        let home = command(descriptor("home"), body.clone());
        let alice = h.player("alice", &["command.home"]);
        h.ledger.deposit(alice.id, 5.0);

        let _ = h.pipeline.execute(&home, alice.clone(), CommandArgs::default()).await;

        let firing = h.pipeline.warmups().clone();
        let cancelling = h.pipeline.canceller();
        let id = alice.id;
        let (fired, cancelled) = tokio::join!(
            tokio::spawn(async move { firing.fire(id).await }),
            tokio::spawn(async move { cancelling.on_disconnect(id).await }),
        );

        assert!(fired.unwrap() ^ cancelled.unwrap());
        h.scheduler.run_pending().await;
        let refunded = h.ledger.refunds().len();
        assert_eq!(body.runs() + refunded, 1);
        assert_eq!(h.ledger.balance(alice.id), Some(if refunded == 1 { 5.0 } else { 0.0 }));
    }
}

#[tokio::test]
async fn test_warmup_fired_during_locked_invocation_rechecks_cooldown() {
    let ledger = Arc::new(HeldLedger::new());
    let permissions = Arc::new(StaticPermissions::new());
    let (pipeline, scheduler, messenger) = pipeline_with(
        ledger.clone(),
        permissions.clone(),
        Arc::new(FixedConfig::new(60, 10, 1.0)),
    );
    let body = Arc::new(ScriptedBody::succeeding());
    let home = command(descriptor("home"), body.clone());
    let alice = Actor::player(Uuid::new_v4(), "alice");
    permissions.grant(alice.id, "command.home");
    ledger.inner.deposit(alice.id, 10.0);

    let first = pipeline.execute(&home, alice.clone(), CommandArgs::default()).await;
    assert!(matches!(first, Ok(Dispatched::WarmupPending { .. })));

    // Passes the cooldown check, then parks in the ledger while holding alice's lock.
    ledger.hold_next.store(true, Ordering::SeqCst);
    let second = tokio::spawn({
        let pipeline = pipeline.clone();
        let home = home.clone();
        let alice = alice.clone();
        async move { pipeline.execute(&home, alice, CommandArgs::default()).await }
    });
    ledger.entered.notified().await;

    let advancing = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.advance(Duration::from_secs(10)).await }
    });
    while pipeline.warmups().pending(alice.id).is_some() {
        tokio::task::yield_now().await;
    }
    ledger.release.notify_one();

    assert!(matches!(
        second.await.unwrap(),
        Ok(Dispatched::WarmupPending { .. })
    ));
    advancing.await.unwrap();
    assert_eq!(body.runs(), 1);
    assert_eq!(
        pipeline.cooldowns().is_on_cooldown("home", alice.id),
        Some(Duration::from_secs(60))
    );

    scheduler.advance(Duration::from_secs(10)).await;
    assert_eq!(body.runs(), 1);
    assert_eq!(ledger.inner.balance(alice.id), Some(9.0));
    let messages = messenger.messages_for(alice.id);
    let cooldown_notices = messages
        .iter()
        .filter(|m| m.starts_with("You must wait"))
        .count();
    assert_eq!(cooldown_notices, 1);
    assert_eq!(
        messages.last().map(String::as_str),
        Some("You must wait 50 seconds before using /home again.")
    );
}
