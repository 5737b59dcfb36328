// File: cmdgate-core/src/test_utils/helpers.rs
//! Deterministic collaborators for unit and integration tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use cmdgate_common::models::{Actor, BodyResult, CommandFailure, Invocation};
use cmdgate_common::traits::{
    CancelHandle, Clock, CommandBody, ConfigSource, Ledger, Messenger, Scheduler, Task,
};
use cmdgate_common::Error;

use crate::repositories::ledger::InMemoryLedger;
use crate::utils::time::add_std;

/// 2023-11-14T22:13:20Z, an arbitrary fixed starting point.
const START_EPOCH: i64 = 1_700_000_000;

/// A clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(DateTime::from_timestamp(START_EPOCH, 0).unwrap_or_default()),
        }
    }

    pub fn advance(&self, d: Duration) {
        let mut now = self.now.lock();
        *now = add_std(*now, d);
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock() = at;
    }

    /// Time elapsed since the clock was created.
    pub fn elapsed(&self) -> Duration {
        let start = DateTime::from_timestamp(START_EPOCH, 0).unwrap_or_default();
        self.now().signed_duration_since(start).to_std().unwrap_or_default()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

struct TimedTask {
    due: DateTime<Utc>,
    seq: u64,
    cancelled: Arc<AtomicBool>,
    task: Task,
}

struct ManualCancel(Arc<AtomicBool>);

impl CancelHandle for ManualCancel {
    fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Scheduler driven by a [`ManualClock`].
///
/// Nothing runs until the test calls [`ManualScheduler::run_pending`] or
/// [`ManualScheduler::advance`], so every interleaving is explicit.
pub struct ManualScheduler {
    clock: Arc<ManualClock>,
    queue: Mutex<VecDeque<Task>>,
    timed: Mutex<Vec<TimedTask>>,
    seq: AtomicU64,
}

impl ManualScheduler {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            queue: Mutex::new(VecDeque::new()),
            timed: Mutex::new(Vec::new()),
            seq: AtomicU64::new(0),
        }
    }

    /// Runs queued tasks (including any they enqueue) until the queue is empty.
    pub async fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.queue.lock().pop_front();
            match next {
                Some(task) => {
                    task.await;
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    /// Moves time forward, firing timed tasks in due order with the clock set to
    /// each task's due instant.
    pub async fn advance(&self, d: Duration) {
        let target = add_std(self.clock.now(), d);
        loop {
            let next = {
                let mut timed = self.timed.lock();
                timed.retain(|t| !t.cancelled.load(Ordering::SeqCst));
                let idx = timed
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.due <= target)
                    .min_by_key(|(_, t)| (t.due, t.seq))
                    .map(|(i, _)| i);
                idx.map(|i| timed.remove(i))
            };
            let Some(timed_task) = next else { break };
            if timed_task.due > self.clock.now() {
                self.clock.set(timed_task.due);
            }
            self.queue.lock().push_back(timed_task.task);
            self.run_pending().await;
        }
        self.clock.set(target);
        self.run_pending().await;
    }

    /// Timed tasks that are neither cancelled nor fired yet.
    pub fn timed_len(&self) -> usize {
        self.timed
            .lock()
            .iter()
            .filter(|t| !t.cancelled.load(Ordering::SeqCst))
            .count()
    }

    pub fn queued_len(&self) -> usize {
        self.queue.lock().len()
    }
}

impl Scheduler for ManualScheduler {
    fn run_now(&self, task: Task) {
        self.queue.lock().push_back(task);
    }

    fn run_async(&self, task: Task) {
        self.queue.lock().push_back(task);
    }

    fn run_after(&self, delay: Duration, task: Task) -> Box<dyn CancelHandle> {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.timed.lock().push(TimedTask {
            due: add_std(self.clock.now(), delay),
            seq: self.seq.fetch_add(1, Ordering::SeqCst),
            cancelled: cancelled.clone(),
            task,
        });
        Box::new(ManualCancel(cancelled))
    }
}

/// Keeps every message sent, in order.
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(Uuid, String)>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages_for(&self, actor_id: Uuid) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|(id, _)| *id == actor_id)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn count_for(&self, actor_id: Uuid) -> usize {
        self.sent.lock().iter().filter(|(id, _)| *id == actor_id).count()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(&self, actor: &Actor, text: &str) {
        self.sent.lock().push((actor.id, text.to_string()));
    }
}

/// An [`InMemoryLedger`] that also records every charge and refund call.
#[derive(Default)]
pub struct RecordingLedger {
    inner: InMemoryLedger,
    charges: Mutex<Vec<(Uuid, f64)>>,
    refunds: Mutex<Vec<(Uuid, f64)>>,
}

impl RecordingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deposit(&self, actor_id: Uuid, amount: f64) {
        self.inner.deposit(actor_id, amount);
    }

    pub fn balance(&self, actor_id: Uuid) -> Option<f64> {
        self.inner.balance(actor_id)
    }

    pub fn charges(&self) -> Vec<(Uuid, f64)> {
        self.charges.lock().clone()
    }

    pub fn refunds(&self) -> Vec<(Uuid, f64)> {
        self.refunds.lock().clone()
    }
}

#[async_trait]
impl Ledger for RecordingLedger {
    async fn charge(&self, actor_id: Uuid, amount: f64) -> Result<bool, Error> {
        self.charges.lock().push((actor_id, amount));
        self.inner.charge(actor_id, amount).await
    }

    async fn refund(&self, actor_id: Uuid, amount: f64) -> Result<bool, Error> {
        self.refunds.lock().push((actor_id, amount));
        self.inner.refund(actor_id, amount).await
    }
}

/// Config with the same settings for every section.
#[derive(Debug, Clone, Default)]
pub struct FixedConfig {
    pub enabled: bool,
    pub cooldown: i64,
    pub warmup: i64,
    pub cost: f64,
}

impl FixedConfig {
    pub fn new(cooldown: i64, warmup: i64, cost: f64) -> Self {
        Self {
            enabled: true,
            cooldown,
            warmup,
            cost,
        }
    }
}

impl ConfigSource for FixedConfig {
    fn is_enabled(&self, _section: &str) -> bool {
        self.enabled
    }

    fn cooldown_seconds(&self, _section: &str) -> i64 {
        self.cooldown
    }

    fn warmup_seconds(&self, _section: &str) -> i64 {
        self.warmup
    }

    fn cost(&self, _section: &str) -> f64 {
        self.cost
    }
}

/// What a [`ScriptedBody`] does when executed.
#[derive(Debug, Clone)]
pub enum BodyScript {
    Succeed,
    FailWith(String),
    Error(String),
    Panic(String),
}

/// Command body with canned behavior that counts its executions.
pub struct ScriptedBody {
    script: Mutex<BodyScript>,
    pre_check_failure: Mutex<Option<String>>,
    delay: Option<Duration>,
    runs: AtomicUsize,
}

impl ScriptedBody {
    pub fn new(script: BodyScript) -> Self {
        Self {
            script: Mutex::new(script),
            pre_check_failure: Mutex::new(None),
            delay: None,
            runs: AtomicUsize::new(0),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(BodyScript::Succeed)
    }

    /// Sleeps (tokio time) inside `execute`, to widen race windows.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_script(&self, script: BodyScript) {
        *self.script.lock() = script;
    }

    pub fn fail_pre_check(&self, reason: &str) {
        *self.pre_check_failure.lock() = Some(reason.to_string());
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandBody for ScriptedBody {
    async fn pre_check(&self, _invocation: &Invocation) -> Result<(), String> {
        match self.pre_check_failure.lock().clone() {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }

    async fn execute(&self, _invocation: &Invocation) -> BodyResult {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let script = self.script.lock().clone();
        match script {
            BodyScript::Succeed => Ok(()),
            BodyScript::FailWith(msg) => Err(CommandFailure::Message(msg)),
            BodyScript::Error(msg) => Err(CommandFailure::Unexpected(anyhow::anyhow!(msg))),
            BodyScript::Panic(msg) => panic!("{}", msg),
        }
    }
}
