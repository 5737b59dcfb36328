// File: cmdgate-core/src/tasks/scheduler.rs

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::sleep;
use tracing::{debug, error, warn};

use cmdgate_common::traits::{CancelHandle, Scheduler, Task};

/// Scheduler on the ambient tokio runtime.
///
/// `run_now` and elapsed `run_after` tasks share one serial worker, so they never
/// overlap each other. `run_async` tasks are plain `tokio::spawn`s.
pub struct TokioScheduler {
    sync_tx: mpsc::UnboundedSender<Task>,
    worker: JoinHandle<()>,
}

struct TimerHandle(AbortHandle);

impl CancelHandle for TimerHandle {
    fn cancel(&self) {
        self.0.abort();
    }
}

impl TokioScheduler {
    /// Must be called from inside a tokio runtime.
    pub fn start() -> Self {
        let (sync_tx, sync_rx) = mpsc::unbounded_channel();
        Self {
            sync_tx,
            worker: spawn_sync_worker(sync_rx),
        }
    }

    fn enqueue(tx: &mpsc::UnboundedSender<Task>, task: Task) {
        if tx.send(task).is_err() {
            warn!("Sync worker has stopped; task dropped");
        }
    }

    /// Stops accepting work once every clone of the queue is gone, then waits for the
    /// worker to drain what was already queued.
    pub async fn shutdown(self) {
        let TokioScheduler { sync_tx, worker } = self;
        drop(sync_tx);
        if let Err(e) = worker.await {
            error!("Sync worker ended abnormally: {:?}", e);
        }
    }
}

fn spawn_sync_worker(mut rx: mpsc::UnboundedReceiver<Task>) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!("Sync worker started");
        while let Some(task) = rx.recv().await {
            if AssertUnwindSafe(task).catch_unwind().await.is_err() {
                error!("Task on the sync worker panicked");
            }
        }
        debug!("Sync worker stopped");
    })
}

impl Scheduler for TokioScheduler {
    fn run_now(&self, task: Task) {
        Self::enqueue(&self.sync_tx, task);
    }

    fn run_async(&self, task: Task) {
        tokio::spawn(task);
    }

    fn run_after(&self, delay: Duration, task: Task) -> Box<dyn CancelHandle> {
        let tx = self.sync_tx.clone();
        let timer = tokio::spawn(async move {
            sleep(delay).await;
            Self::enqueue(&tx, task);
        });
        Box::new(TimerHandle(timer.abort_handle()))
    }
}
