use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::{FailureKind, Stage, StageFailure, UnitOutcome};
use crate::queue::StageQueue;
use crate::runtime::Runtime;

/// Worker group handle for one stage queue.
/// - `request_shutdown()` stops all workers of the group
/// - `shutdown_and_join()` also waits for them to exit
pub struct WorkerGroup {
    stage: Stage,
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers consuming `queue`.
    pub fn spawn(n: usize, queue: StageQueue, runtime: Arc<Runtime>) -> Self {
        let stage = queue.stage();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let q = queue.clone();
            let rt = Arc::clone(&runtime);
            let mut rx = shutdown_rx.clone();

            let join = tokio::spawn(async move {
                worker_loop(worker_id, q, rt, &mut rx).await;
            });
            joins.push(join);
        }
        info!(%stage, workers = n, "worker group started");

        Self {
            stage,
            shutdown_tx,
            joins,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Request shutdown for all workers.
    /// A worker in the middle of a unit finishes (or observes cancellation)
    /// before it exits; it just stops taking new leases.
    pub fn request_shutdown(&self) {
        // ignore send error: receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for all workers.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for j in self.joins {
            let _ = j.await;
        }
        info!(stage = %self.stage, "worker group stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: StageQueue,
    runtime: Arc<Runtime>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    let stage = queue.stage();
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let lease = tokio::select! {
            changed = shutdown_rx.changed() => {
                // Sender dropped: the group handle is gone.
                if changed.is_err() {
                    break;
                }
                continue;
            }
            lease = queue.lease() => lease,
        };

        // Queue closed.
        let Some(lease) = lease else {
            break;
        };

        let unit = lease.unit();
        debug!(worker = worker_id, %stage, item = %unit.item(), unit = %unit.unit_id(), "start");
        // A panicking port must still complete its lease.
        let rt = Arc::clone(&runtime);
        let owned = unit.clone();
        let outcome = match tokio::spawn(async move { rt.execute(&owned).await }).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(worker = worker_id, %stage, item = %unit.item(), error = %err, "unit task aborted");
                UnitOutcome::Failed(StageFailure::new(
                    FailureKind::Processing,
                    format!("unit task aborted: {err}"),
                ))
            }
        };
        match &outcome {
            UnitOutcome::Succeeded(bytes) => {
                debug!(worker = worker_id, %stage, item = %unit.item(), bytes = bytes.len(), "succeeded");
            }
            UnitOutcome::Failed(failure) => {
                debug!(worker = worker_id, %stage, item = %unit.item(), error = %failure, "failed");
            }
            UnitOutcome::Cancelled => {
                debug!(worker = worker_id, %stage, item = %unit.item(), "cancelled");
            }
        }
        lease.complete(outcome);
    }
    debug!(worker = worker_id, %stage, "worker exit");
}
