//! In-memory stage queue: FIFO, concurrency-bounded, suspendable.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{QueueState, WorkUnit};
use crate::domain::{Completion, Stage, UnitId, UnitOutcome};

/// Result of [`StageQueue::cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelDisposition {
    /// Removed before it started; a `Cancelled` completion was posted.
    Dequeued,
    /// Already executing; its token was cancelled and the body will observe it.
    Signalled,
    /// The queue no longer knows the unit (already finished).
    Unknown,
}

struct Inner {
    pending: VecDeque<WorkUnit>,
    running: HashMap<UnitId, CancellationToken>,
    state: QueueState,
    closed: bool,
}

struct Shared {
    stage: Stage,
    max_concurrent: usize,
    inner: Mutex<Inner>,
    notify: Notify,
    completions: mpsc::UnboundedSender<Completion>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn post(&self, completion: Completion) {
        // The receiver is gone only when the control context shut down.
        let _ = self.completions.send(completion);
    }
}

/// Ordered execution queue for one stage.
///
/// Design:
/// - Enqueue/cancel/suspend/resume are synchronous and called from the
///   control context. Locks are never held across an await.
/// - Workers block in [`StageQueue::lease`] until a unit may start.
/// - The concurrency bound is enforced here, independent of how many workers poll.
#[derive(Clone)]
pub struct StageQueue {
    shared: Arc<Shared>,
}

impl StageQueue {
    pub fn new(
        stage: Stage,
        max_concurrent: usize,
        completions: mpsc::UnboundedSender<Completion>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                stage,
                max_concurrent: max_concurrent.max(1),
                inner: Mutex::new(Inner {
                    pending: VecDeque::new(),
                    running: HashMap::new(),
                    state: QueueState::Running,
                    closed: false,
                }),
                notify: Notify::new(),
                completions,
            }),
        }
    }

    pub fn stage(&self) -> Stage {
        self.shared.stage
    }

    pub fn state(&self) -> QueueState {
        self.shared.lock().state
    }

    pub fn pending_len(&self) -> usize {
        self.shared.lock().pending.len()
    }

    pub fn running(&self) -> usize {
        self.shared.lock().running.len()
    }

    /// Append a unit. It starts as soon as the queue is running and a slot is free.
    pub fn enqueue(&self, unit: WorkUnit) {
        debug!(stage = %self.stage(), item = %unit.item(), unit = %unit.unit_id(), "enqueue");
        {
            let mut inner = self.shared.lock();
            if inner.closed {
                drop(inner);
                self.shared
                    .post(Completion::cancelled(unit.unit_id(), unit.item(), self.stage()));
                return;
            }
            inner.pending.push_back(unit);
        }
        self.shared.notify.notify_one();
    }

    /// Stop handing pending units to workers. Running units continue.
    pub fn suspend(&self) {
        let mut inner = self.shared.lock();
        if inner.state != QueueState::Suspended {
            debug!(stage = %self.stage(), pending = inner.pending.len(), "suspend");
            inner.state = QueueState::Suspended;
        }
    }

    /// Re-admit the existing pending order.
    pub fn resume(&self) {
        {
            let mut inner = self.shared.lock();
            if inner.state == QueueState::Running {
                return;
            }
            debug!(stage = %self.stage(), pending = inner.pending.len(), "resume");
            inner.state = QueueState::Running;
        }
        self.shared.notify.notify_waiters();
    }

    /// Cancel a unit by id.
    ///
    /// A pending unit never runs: it is removed and a `Cancelled` completion
    /// is posted for it. A running unit only has its token cancelled.
    pub fn cancel(&self, unit_id: UnitId) -> CancelDisposition {
        let removed = {
            let mut inner = self.shared.lock();
            if let Some(pos) = inner.pending.iter().position(|u| u.unit_id() == unit_id) {
                inner.pending.remove(pos)
            } else if let Some(token) = inner.running.get(&unit_id) {
                token.cancel();
                return CancelDisposition::Signalled;
            } else {
                return CancelDisposition::Unknown;
            }
        };

        match removed {
            Some(unit) => {
                unit.cancel_token().cancel();
                self.shared
                    .post(Completion::cancelled(unit.unit_id(), unit.item(), self.stage()));
                CancelDisposition::Dequeued
            }
            None => CancelDisposition::Unknown,
        }
    }

    /// Wait for the next unit that may start.
    ///
    /// Returns `None` once the queue is closed.
    pub async fn lease(&self) -> Option<UnitLease> {
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            // Register interest before inspecting state so a resume/enqueue
            // between the check and the await is not lost.
            notified.as_mut().enable();

            {
                let mut inner = self.shared.lock();
                if inner.closed {
                    return None;
                }
                if inner.state.admits_dispatch()
                    && inner.running.len() < self.shared.max_concurrent
                    && let Some(unit) = inner.pending.pop_front()
                {
                    inner
                        .running
                        .insert(unit.unit_id(), unit.cancel_token().clone());
                    return Some(UnitLease {
                        unit,
                        shared: Arc::clone(&self.shared),
                    });
                }
            }

            notified.await;
        }
    }

    /// Shut the queue down: cancel everything and release waiting workers.
    pub fn close(&self) {
        {
            let mut inner = self.shared.lock();
            inner.closed = true;
            for unit in inner.pending.drain(..) {
                unit.cancel_token().cancel();
            }
            for token in inner.running.values() {
                token.cancel();
            }
        }
        self.shared.notify.notify_waiters();
    }
}

/// A unit handed to a worker.
///
/// The worker must call [`UnitLease::complete`]. Dropping the lease (also on
/// completion) frees the concurrency slot.
pub struct UnitLease {
    unit: WorkUnit,
    shared: Arc<Shared>,
}

impl UnitLease {
    pub fn unit(&self) -> &WorkUnit {
        &self.unit
    }

    /// Report the outcome to the control context.
    pub fn complete(self, outcome: UnitOutcome) {
        // A unit that observed cancellation reports `Cancelled` regardless of
        // what the body returned.
        let outcome = if self.unit.is_cancelled() {
            UnitOutcome::Cancelled
        } else {
            outcome
        };
        self.shared.post(Completion {
            unit_id: self.unit.unit_id(),
            item: self.unit.item(),
            stage: self.shared.stage,
            outcome,
        });
    }
}

impl Drop for UnitLease {
    fn drop(&mut self) {
        self.shared.lock().running.remove(&self.unit.unit_id());
        self.shared.notify.notify_one();
    }
}
