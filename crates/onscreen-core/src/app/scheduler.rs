//! Scheduler - the control context.
//!
//! Owns the item records and the in-flight registry. Every mutation of either
//! happens through `&mut self`, one call at a time: viewport events and
//! completions are applied atomically with respect to each other.
//!
//! # Flow
//! 1. The display layer reports the visible set (or motion start/settle).
//! 2. `reconcile` diffs visible against in-flight: cancels what scrolled away,
//!    dispatches what scrolled in.
//! 3. Workers post `Completion`s; `apply_completion` validates them against the
//!    registry, moves the record, and notifies the `StateSink`.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::domain::{
    Completion, CompletionDisposition, DiscardReason, ItemEvent, ItemId, ItemRecord, Manifest,
    Stage, StateChange, UnitOutcome, ViewportEvent,
};
use crate::error::SchedulerError;
use crate::observability::ItemCounts;
use crate::ports::{ManifestLoader, StateSink};
use crate::queue::{StageQueue, WorkUnit};
use crate::registry::InFlightRegistry;

/// What one reconciliation pass did. Both lists are sorted by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub cancelled: Vec<ItemId>,
    pub started: Vec<(ItemId, Stage)>,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.cancelled.is_empty() && self.started.is_empty()
    }
}

pub struct Scheduler {
    config: SchedulerConfig,
    records: BTreeMap<ItemId, ItemRecord>,
    registry: InFlightRegistry,
    fetch_queue: StageQueue,
    transform_queue: StageQueue,
    completions: mpsc::UnboundedReceiver<Completion>,
    sink: Arc<dyn StateSink>,
    visible: HashSet<ItemId>,
    in_motion: bool,
}

impl Scheduler {
    /// Create the control context and its two stage queues.
    ///
    /// No workers are attached; see `AppBuilder` for the wired-up version.
    pub fn new(config: SchedulerConfig, sink: Arc<dyn StateSink>) -> Result<Self, SchedulerError> {
        config.validate()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let fetch_queue = StageQueue::new(Stage::Fetch, config.fetch_concurrency, tx.clone());
        let transform_queue = StageQueue::new(Stage::Transform, config.transform_concurrency, tx);
        Ok(Self {
            config,
            records: BTreeMap::new(),
            registry: InFlightRegistry::new(),
            fetch_queue,
            transform_queue,
            completions: rx,
            sink,
            visible: HashSet::new(),
            in_motion: false,
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub(crate) fn queue(&self, stage: Stage) -> &StageQueue {
        match stage {
            Stage::Fetch => &self.fetch_queue,
            Stage::Transform => &self.transform_queue,
        }
    }

    pub fn registry(&self) -> &InFlightRegistry {
        &self.registry
    }

    pub fn record(&self, item: ItemId) -> Option<&ItemRecord> {
        self.records.get(&item)
    }

    /// Records in manifest order.
    pub fn records(&self) -> impl Iterator<Item = &ItemRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn visible(&self) -> &HashSet<ItemId> {
        &self.visible
    }

    pub fn in_motion(&self) -> bool {
        self.in_motion
    }

    pub fn counts(&self) -> ItemCounts {
        let mut counts = ItemCounts::default();
        for record in self.records.values() {
            counts.record(record.state());
        }
        counts.in_flight_fetch = self.registry.len(Stage::Fetch);
        counts.in_flight_transform = self.registry.len(Stage::Transform);
        counts
    }

    // ── Manifest ──────────────────────────────────────────────────

    /// Load the item set and start a scheduling cycle.
    ///
    /// On failure the current items are kept untouched and nothing is scheduled.
    pub async fn load_manifest(
        &mut self,
        loader: &dyn ManifestLoader,
    ) -> Result<usize, SchedulerError> {
        let manifest = match loader.load().await {
            Ok(manifest) => manifest,
            Err(err) => {
                warn!(error = %err, items = self.records.len(), "manifest load failed; keeping current items");
                return Err(err);
            }
        };
        let count = self.replace_items(manifest);
        if !self.in_motion {
            let visible = self.visible.clone();
            self.reconcile(visible);
        }
        Ok(count)
    }

    /// Replace all records. Work in flight for the old set is cancelled.
    pub fn replace_items(&mut self, manifest: Manifest) -> usize {
        let in_flight = self.registry.in_flight_keys();
        for item in in_flight {
            self.cancel_item(item);
        }
        self.records = manifest
            .iter()
            .map(|(id, entry)| {
                (
                    id,
                    ItemRecord::new(id, entry.name.clone(), entry.source.clone()),
                )
            })
            .collect();
        info!(items = self.records.len(), "items loaded");
        self.records.len()
    }

    // ── Viewport ──────────────────────────────────────────────────

    pub fn handle_viewport(&mut self, event: ViewportEvent) -> ReconcileReport {
        match event {
            ViewportEvent::MotionStarted => {
                self.motion_started();
                ReconcileReport::default()
            }
            ViewportEvent::MotionSettled { visible } => self.motion_settled(visible),
            ViewportEvent::VisibleChanged { visible } => self.visible_changed(visible),
        }
    }

    /// Suspend both queues for the duration of the motion.
    pub fn motion_started(&mut self) {
        if self.in_motion {
            return;
        }
        debug!("motion started");
        self.in_motion = true;
        for stage in Stage::ALL {
            self.queue(stage).suspend();
        }
    }

    /// One reconciliation pass for the settled viewport, then resume.
    pub fn motion_settled(&mut self, visible: HashSet<ItemId>) -> ReconcileReport {
        debug!(visible = visible.len(), "motion settled");
        self.in_motion = false;
        // Reconcile while still suspended so cancelled units cannot start in between.
        let report = self.reconcile(visible);
        for stage in Stage::ALL {
            self.queue(stage).resume();
        }
        report
    }

    /// Visible set changed without motion. During motion it is only recorded.
    pub fn visible_changed(&mut self, visible: HashSet<ItemId>) -> ReconcileReport {
        if self.in_motion {
            self.visible = visible;
            return ReconcileReport::default();
        }
        self.reconcile(visible)
    }

    /// Diff `visible` against in-flight work: cancel what left, start what entered.
    pub fn reconcile(&mut self, visible: HashSet<ItemId>) -> ReconcileReport {
        let in_flight = self.registry.in_flight_keys();

        let mut to_cancel: Vec<ItemId> = in_flight.difference(&visible).copied().collect();
        let mut to_start: Vec<ItemId> = visible.difference(&in_flight).copied().collect();
        to_cancel.sort();
        to_start.sort();
        self.visible = visible;

        let mut report = ReconcileReport::default();
        for item in to_cancel {
            if self.cancel_item(item) {
                report.cancelled.push(item);
            }
        }
        for item in to_start {
            match self.dispatch(item) {
                Ok(Some(stage)) => report.started.push((item, stage)),
                Ok(None) => {}
                Err(err) => warn!(%item, error = %err, "dispatch rejected"),
            }
        }

        if !report.is_empty() {
            info!(
                cancelled = report.cancelled.len(),
                started = report.started.len(),
                "reconciled"
            );
        }
        report
    }

    /// Cancel whatever is in flight for `item`, checking each stage on its own.
    fn cancel_item(&mut self, item: ItemId) -> bool {
        let mut cancelled = false;
        for stage in Stage::ALL {
            if let Some(handle) = self.registry.unregister(stage, item) {
                handle.cancel();
                let disposition = self.queue(stage).cancel(handle.unit_id());
                debug!(%item, %stage, ?disposition, "cancelled");
                cancelled = true;
            }
        }
        cancelled
    }

    /// Enqueue the stage `item` needs next, unless it is already in flight.
    fn dispatch(&mut self, item: ItemId) -> Result<Option<Stage>, SchedulerError> {
        let Some(record) = self.records.get(&item) else {
            debug!(%item, "visible item has no record");
            return Ok(None);
        };
        let Some(stage) = record.state().next_stage() else {
            return Ok(None);
        };
        // A unit may have completed between the snapshot and now.
        if self.registry.lookup(stage, item).is_some() {
            return Ok(None);
        }

        let unit = match stage {
            Stage::Fetch => WorkUnit::fetch(item, record.source().clone()),
            Stage::Transform => {
                let Some(raw) = record.raw_payload() else {
                    warn!(%item, "fetched item has no payload");
                    return Ok(None);
                };
                WorkUnit::transform(item, raw.clone())
            }
        };
        self.registry.register(stage, item, unit.handle())?;
        self.queue(stage).enqueue(unit);
        Ok(Some(stage))
    }

    // ── Completions ───────────────────────────────────────────────

    /// Wait for the next completion from any stage.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        self.completions.recv().await
    }

    /// Apply every completion that is already waiting. Returns how many were read.
    pub fn drain_completions(&mut self) -> usize {
        let mut n = 0;
        while let Ok(completion) = self.completions.try_recv() {
            self.apply_completion(completion);
            n += 1;
        }
        n
    }

    /// Validate a completion against the registry and apply it.
    ///
    /// A completion from a unit that is no longer registered is discarded
    /// without touching the record or the registry. The current unit's entry
    /// is always released, whatever happens to the record.
    pub fn apply_completion(&mut self, completion: Completion) -> CompletionDisposition {
        let Completion {
            unit_id,
            item,
            stage,
            outcome,
        } = completion;

        if !self.registry.is_current(stage, item, unit_id) {
            let reason = match self.registry.lookup(stage, item) {
                Some(_) => DiscardReason::Superseded,
                None => DiscardReason::CancelledAfterCompletion,
            };
            return self.discard(item, stage, reason);
        }
        let cancelled = self
            .registry
            .unregister(stage, item)
            .is_some_and(|handle| handle.is_cancelled());
        if cancelled {
            return self.discard(item, stage, DiscardReason::CancelledAfterCompletion);
        }

        let Some(record) = self.records.get_mut(&item) else {
            return self.discard(item, stage, DiscardReason::UnknownItem);
        };
        if let UnitOutcome::Failed(failure) = &outcome {
            let err = SchedulerError::stage_failed(stage, failure.to_string());
            warn!(%item, error = %err, "stage failed");
        }
        let event = match record.complete_stage(stage, outcome) {
            Ok(Some(event)) => event,
            // Cancelled from outside the scheduler (queue shutdown).
            Ok(None) => return self.discard(item, stage, DiscardReason::CancelledAfterCompletion),
            Err(err) => {
                warn!(%item, error = %err, "completion does not fit record state");
                return self.discard(item, stage, DiscardReason::InvalidTransition);
            }
        };

        debug!(%item, %stage, state = %record.state(), "applied");
        self.sink.emit(StateChange::from_record(record));

        if matches!(event, ItemEvent::FetchSucceeded) && self.should_chain(item) {
            if let Err(err) = self.dispatch(item) {
                warn!(%item, error = %err, "dispatch rejected");
            }
        }
        CompletionDisposition::Applied { item, event }
    }

    fn should_chain(&self, item: ItemId) -> bool {
        self.config.dispatch_on_completion && !self.in_motion && self.visible.contains(&item)
    }

    fn discard(&self, item: ItemId, stage: Stage, reason: DiscardReason) -> CompletionDisposition {
        debug!(%item, %stage, ?reason, "completion discarded");
        CompletionDisposition::Discarded(reason)
    }

    // ── External actions ──────────────────────────────────────────

    /// Explicit retry: move a `Failed` item back to `New`.
    ///
    /// Returns `Ok(false)` if the item was not failed. A visible item is
    /// dispatched again right away unless the viewport is in motion.
    pub fn reset_item(&mut self, item: ItemId) -> Result<bool, SchedulerError> {
        let record = self
            .records
            .get_mut(&item)
            .ok_or(SchedulerError::UnknownItem(item))?;
        if !record.reset() {
            return Ok(false);
        }
        info!(%item, "item reset");
        self.sink.emit(StateChange::from_record(record));

        if !self.in_motion && self.visible.contains(&item) {
            self.dispatch(item)?;
        }
        Ok(true)
    }

    /// Cancel all in-flight work and close both queues.
    pub fn shutdown(&mut self) {
        let in_flight = self.registry.in_flight_keys();
        for item in in_flight {
            self.cancel_item(item);
        }
        for stage in Stage::ALL {
            self.queue(stage).close();
        }
        self.drain_completions();
    }

    #[cfg(test)]
    pub(crate) fn record_mut(&mut self, item: ItemId) -> Option<&mut ItemRecord> {
        self.records.get_mut(&item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FailureKind, ItemState, ManifestEntry, StageFailure, UnitId};
    use crate::impls::{RecordingStateSink, StaticManifestLoader};
    use crate::queue::{CancelDisposition, QueueState};
    use bytes::Bytes;
    use rstest::rstest;
    use std::time::Duration;

    const A: ItemId = ItemId::new(0);
    const B: ItemId = ItemId::new(1);
    const C: ItemId = ItemId::new(2);
    const D: ItemId = ItemId::new(3);

    fn manifest(n: usize) -> Manifest {
        (0..n)
            .map(|i| ManifestEntry::new(format!("photo-{i}"), format!("http://x/{i}.png")))
            .collect()
    }

    fn scheduler(n: usize) -> (Scheduler, Arc<RecordingStateSink>) {
        let sink = Arc::new(RecordingStateSink::default());
        let mut s = Scheduler::new(SchedulerConfig::default(), sink.clone()).unwrap();
        s.replace_items(manifest(n));
        (s, sink)
    }

    fn set(items: &[ItemId]) -> HashSet<ItemId> {
        items.iter().copied().collect()
    }

    fn unit_of(s: &Scheduler, stage: Stage, item: ItemId) -> UnitId {
        s.registry().lookup(stage, item).unwrap().unit_id()
    }

    fn succeeded(s: &Scheduler, stage: Stage, item: ItemId, bytes: &'static [u8]) -> Completion {
        Completion {
            unit_id: unit_of(s, stage, item),
            item,
            stage,
            outcome: UnitOutcome::Succeeded(Bytes::from_static(bytes)),
        }
    }

    fn mark_fetched(s: &mut Scheduler, item: ItemId) {
        s.record_mut(item)
            .unwrap()
            .complete_stage(Stage::Fetch, UnitOutcome::Succeeded(Bytes::from_static(b"raw")))
            .unwrap();
    }

    #[test]
    fn visible_items_get_the_stage_matching_their_state() {
        // [A:New, B:New, C:FetchedRaw], visible {A, C}
        let (mut s, _) = scheduler(3);
        mark_fetched(&mut s, C);

        let report = s.reconcile(set(&[A, C]));

        assert_eq!(report.started, vec![(A, Stage::Fetch), (C, Stage::Transform)]);
        assert!(report.cancelled.is_empty());
        assert!(s.registry().lookup(Stage::Fetch, A).is_some());
        assert!(s.registry().lookup(Stage::Transform, C).is_some());
        assert!(s.registry().lookup(Stage::Fetch, B).is_none());
        assert!(s.registry().lookup(Stage::Transform, B).is_none());
        assert_eq!(s.queue(Stage::Fetch).pending_len(), 1);
        assert_eq!(s.queue(Stage::Transform).pending_len(), 1);
    }

    #[tokio::test]
    async fn scrolled_away_item_is_cancelled_and_stays_new() {
        let (mut s, sink) = scheduler(2);
        s.reconcile(set(&[A]));
        let stale = unit_of(&s, Stage::Fetch, A);

        let report = s.reconcile(set(&[B]));

        assert_eq!(report.cancelled, vec![A]);
        assert!(s.registry().lookup(Stage::Fetch, A).is_none());
        assert_eq!(s.record(A).unwrap().state(), ItemState::New);

        // The queue posts a Cancelled completion for the never-started unit.
        let c = s.next_completion().await.unwrap();
        assert_eq!(c.unit_id, stale);
        assert_eq!(
            s.apply_completion(c),
            CompletionDisposition::Discarded(DiscardReason::CancelledAfterCompletion)
        );
        assert_eq!(s.record(A).unwrap().state(), ItemState::New);
        assert!(sink.changes().is_empty());
    }

    #[test]
    fn stale_success_after_cancel_changes_nothing() {
        let (mut s, sink) = scheduler(1);
        s.reconcile(set(&[A]));
        let late = succeeded(&s, Stage::Fetch, A, b"late");

        s.reconcile(HashSet::new());
        let disposition = s.apply_completion(late);

        assert_eq!(
            disposition,
            CompletionDisposition::Discarded(DiscardReason::CancelledAfterCompletion)
        );
        assert_eq!(s.record(A).unwrap().state(), ItemState::New);
        assert!(s.record(A).unwrap().raw_payload().is_none());
        assert!(s.registry().is_empty());
        assert!(sink.changes().is_empty());
    }

    #[test]
    fn completion_of_replaced_unit_is_superseded() {
        let (mut s, _) = scheduler(1);
        s.reconcile(set(&[A]));
        let late = succeeded(&s, Stage::Fetch, A, b"late");
        s.reconcile(HashSet::new());
        s.reconcile(set(&[A]));
        let current = unit_of(&s, Stage::Fetch, A);

        assert_eq!(
            s.apply_completion(late),
            CompletionDisposition::Discarded(DiscardReason::Superseded)
        );
        assert_eq!(unit_of(&s, Stage::Fetch, A), current);
        assert_eq!(s.record(A).unwrap().state(), ItemState::New);
    }

    #[tokio::test]
    async fn cancelled_running_unit_reports_cancelled() {
        let (mut s, _) = scheduler(1);
        s.reconcile(set(&[A]));
        let lease = s.queue(Stage::Fetch).lease().await.unwrap();

        s.reconcile(HashSet::new());
        assert!(lease.unit().is_cancelled());
        assert_eq!(
            s.queue(Stage::Fetch).cancel(lease.unit().unit_id()),
            CancelDisposition::Signalled
        );

        lease.complete(UnitOutcome::Succeeded(Bytes::from_static(b"raw")));
        let c = s.next_completion().await.unwrap();
        assert_eq!(c.outcome, UnitOutcome::Cancelled);
        assert!(matches!(
            s.apply_completion(c),
            CompletionDisposition::Discarded(_)
        ));
        assert_eq!(s.record(A).unwrap().state(), ItemState::New);
    }

    #[test]
    fn fetch_success_chains_transform_for_visible_item() {
        let (mut s, sink) = scheduler(1);
        s.reconcile(set(&[A]));

        let c = succeeded(&s, Stage::Fetch, A, b"raw");
        assert_eq!(
            s.apply_completion(c),
            CompletionDisposition::Applied {
                item: A,
                event: ItemEvent::FetchSucceeded
            }
        );
        assert_eq!(s.record(A).unwrap().state(), ItemState::FetchedRaw);
        assert!(s.registry().lookup(Stage::Fetch, A).is_none());
        assert!(s.registry().lookup(Stage::Transform, A).is_some());

        let c = succeeded(&s, Stage::Transform, A, b"sepia");
        s.apply_completion(c);
        let record = s.record(A).unwrap();
        assert_eq!(record.state(), ItemState::Ready);
        assert_eq!(record.final_result().unwrap().as_ref(), b"sepia");
        assert!(s.registry().is_empty());

        let states: Vec<_> = sink.changes().iter().map(|c| (c.item, c.state)).collect();
        assert_eq!(states, vec![(A, ItemState::FetchedRaw), (A, ItemState::Ready)]);
    }

    #[test]
    fn chaining_can_be_disabled() {
        let sink = Arc::new(RecordingStateSink::default());
        let config = SchedulerConfig {
            dispatch_on_completion: false,
            ..SchedulerConfig::default()
        };
        let mut s = Scheduler::new(config, sink).unwrap();
        s.replace_items(manifest(1));
        s.reconcile(set(&[A]));

        let c = succeeded(&s, Stage::Fetch, A, b"raw");
        s.apply_completion(c);
        assert!(s.registry().is_empty());

        let report = s.reconcile(set(&[A]));
        assert_eq!(report.started, vec![(A, Stage::Transform)]);
    }

    #[test]
    fn fetch_completed_during_motion_waits_for_settle() {
        let (mut s, sink) = scheduler(1);
        s.reconcile(set(&[A]));
        s.motion_started();
        assert_eq!(s.queue(Stage::Fetch).state(), QueueState::Suspended);
        assert_eq!(s.queue(Stage::Transform).state(), QueueState::Suspended);

        let c = succeeded(&s, Stage::Fetch, A, b"raw");
        s.apply_completion(c);

        // Applied immediately...
        assert_eq!(s.record(A).unwrap().state(), ItemState::FetchedRaw);
        assert_eq!(sink.changes().len(), 1);
        // ...but no transform until the viewport settles.
        assert!(s.registry().is_empty());

        let report = s.motion_settled(set(&[A]));
        assert_eq!(report.started, vec![(A, Stage::Transform)]);
        assert_eq!(s.queue(Stage::Transform).state(), QueueState::Running);
        assert_eq!(s.queue(Stage::Fetch).state(), QueueState::Running);
    }

    #[test]
    fn visible_changes_during_motion_do_not_reconcile() {
        let (mut s, _) = scheduler(3);
        s.motion_started();

        let report = s.handle_viewport(ViewportEvent::VisibleChanged {
            visible: set(&[A, B]),
        });
        assert!(report.is_empty());
        assert!(s.registry().is_empty());
        assert_eq!(s.visible(), &set(&[A, B]));

        let report = s.handle_viewport(ViewportEvent::MotionSettled {
            visible: set(&[B, C]),
        });
        assert_eq!(report.started, vec![(B, Stage::Fetch), (C, Stage::Fetch)]);
        assert!(!s.in_motion());
    }

    #[test]
    fn failed_transform_is_terminal() {
        let (mut s, sink) = scheduler(3);
        mark_fetched(&mut s, C);
        s.reconcile(set(&[C]));

        let c = Completion {
            unit_id: unit_of(&s, Stage::Transform, C),
            item: C,
            stage: Stage::Transform,
            outcome: UnitOutcome::Failed(StageFailure::new(FailureKind::Processing, "bad")),
        };
        assert_eq!(
            s.apply_completion(c),
            CompletionDisposition::Applied {
                item: C,
                event: ItemEvent::TransformFailed
            }
        );
        assert_eq!(s.record(C).unwrap().state(), ItemState::Failed);
        assert!(s.record(C).unwrap().raw_payload().is_none());
        assert_eq!(sink.changes().last().unwrap().state, ItemState::Failed);

        let report = s.reconcile(set(&[C]));
        assert!(report.started.is_empty());
        assert!(s.registry().is_empty());
        assert_eq!(s.queue(Stage::Transform).pending_len(), 1); // only the original unit
    }

    #[test]
    fn reset_rearms_and_redispatches_visible_item() {
        let (mut s, sink) = scheduler(1);
        s.reconcile(set(&[A]));
        let c = Completion {
            unit_id: unit_of(&s, Stage::Fetch, A),
            item: A,
            stage: Stage::Fetch,
            outcome: UnitOutcome::Failed(StageFailure::new(FailureKind::Transport, "404")),
        };
        s.apply_completion(c);
        assert_eq!(s.record(A).unwrap().state(), ItemState::Failed);

        assert!(s.reset_item(A).unwrap());
        assert_eq!(s.record(A).unwrap().state(), ItemState::New);
        assert!(s.registry().lookup(Stage::Fetch, A).is_some());
        assert_eq!(sink.changes().last().unwrap().state, ItemState::New);

        assert!(!s.reset_item(A).unwrap());
        assert!(matches!(
            s.reset_item(ItemId::new(99)),
            Err(SchedulerError::UnknownItem(_))
        ));
    }

    #[tokio::test]
    async fn cancelled_current_unit_releases_its_entry() {
        let (mut s, sink) = scheduler(1);
        s.reconcile(set(&[A]));
        let unit = unit_of(&s, Stage::Fetch, A);

        // Cancelled at the queue while the registry still holds it.
        assert_eq!(s.queue(Stage::Fetch).cancel(unit), CancelDisposition::Dequeued);
        let c = s.next_completion().await.unwrap();
        assert_eq!(c.unit_id, unit);
        assert_eq!(
            s.apply_completion(c),
            CompletionDisposition::Discarded(DiscardReason::CancelledAfterCompletion)
        );
        assert!(s.registry().is_empty());
        assert!(sink.changes().is_empty());

        let report = s.reconcile(set(&[A]));
        assert_eq!(report.started, vec![(A, Stage::Fetch)]);
    }

    #[test]
    fn completion_for_vanished_record_releases_its_entry() {
        let (mut s, _) = scheduler(1);
        s.reconcile(set(&[A]));
        let c = succeeded(&s, Stage::Fetch, A, b"raw");
        s.records.clear();

        assert_eq!(
            s.apply_completion(c),
            CompletionDisposition::Discarded(DiscardReason::UnknownItem)
        );
        assert!(s.registry().is_empty());
    }

    #[test]
    fn dispatch_skips_stage_already_registered() {
        let (mut s, _) = scheduler(2);
        mark_fetched(&mut s, B);
        s.reconcile(set(&[A, B]));
        let fetch_unit = unit_of(&s, Stage::Fetch, A);
        let transform_unit = unit_of(&s, Stage::Transform, B);

        assert_eq!(s.dispatch(A).unwrap(), None);
        assert_eq!(s.dispatch(B).unwrap(), None);

        assert_eq!(unit_of(&s, Stage::Fetch, A), fetch_unit);
        assert_eq!(unit_of(&s, Stage::Transform, B), transform_unit);
        assert_eq!(s.queue(Stage::Fetch).pending_len(), 1);
        assert_eq!(s.queue(Stage::Transform).pending_len(), 1);
    }

    #[tokio::test]
    async fn dispatch_order_survives_suspend_and_resume() {
        let (mut s, _) = scheduler(4);
        s.reconcile(set(&[A, B]));
        s.motion_started();

        let blocked =
            tokio::time::timeout(Duration::from_millis(20), s.queue(Stage::Fetch).lease()).await;
        assert!(blocked.is_err());

        let report = s.motion_settled(set(&[A, B, C, D]));
        assert_eq!(report.started, vec![(C, Stage::Fetch), (D, Stage::Fetch)]);

        let mut order = Vec::new();
        for _ in 0..4 {
            let lease = s.queue(Stage::Fetch).lease().await.unwrap();
            order.push(lease.unit().item());
            drop(lease);
        }
        assert_eq!(order, vec![A, B, C, D]);
    }

    #[test]
    fn already_in_flight_item_is_not_enqueued_twice() {
        let (mut s, _) = scheduler(1);
        s.reconcile(set(&[A]));
        let report = s.reconcile(set(&[A]));

        assert!(report.is_empty());
        assert_eq!(s.queue(Stage::Fetch).pending_len(), 1);
    }

    #[test]
    fn unknown_visible_ids_are_ignored() {
        let (mut s, _) = scheduler(1);
        let report = s.reconcile(set(&[A, ItemId::new(42)]));
        assert_eq!(report.started, vec![(A, Stage::Fetch)]);
    }

    #[rstest]
    #[case(vec![vec![0, 1, 2], vec![2, 3, 4], vec![4, 5], vec![0, 5]])]
    #[case(vec![vec![], vec![1, 3, 5, 7], vec![0, 2, 4, 6], vec![7]])]
    #[case(vec![vec![0, 1, 2, 3, 4, 5, 6, 7], vec![3], vec![3, 4]])]
    fn in_flight_stays_within_visible(#[case] passes: Vec<Vec<u64>>) {
        let (mut s, _) = scheduler(8);
        mark_fetched(&mut s, ItemId::new(3));
        mark_fetched(&mut s, ItemId::new(6));

        for pass in passes {
            let visible: HashSet<ItemId> = pass.into_iter().map(ItemId::new).collect();
            s.reconcile(visible.clone());

            for stage in Stage::ALL {
                assert!(s.registry().snapshot_keys(stage).is_subset(&visible));
            }
            for item in &visible {
                let state = s.record(*item).unwrap().state();
                if let Some(stage) = state.next_stage() {
                    assert!(
                        s.registry().lookup(stage, *item).is_some(),
                        "{item} in {state} has no {stage} unit"
                    );
                }
            }
        }
    }

    #[tokio::test]
    async fn manifest_failure_keeps_items() {
        let (mut s, _) = scheduler(2);
        let failing = StaticManifestLoader::failing("plist unreadable");

        let err = s.load_manifest(&failing).await.unwrap_err();
        assert!(matches!(err, SchedulerError::ManifestLoadFailed(_)));
        assert_eq!(s.len(), 2);
        assert!(s.registry().is_empty());
    }

    #[tokio::test]
    async fn manifest_load_schedules_visible_items() {
        let sink = Arc::new(RecordingStateSink::default());
        let mut s = Scheduler::new(SchedulerConfig::default(), sink).unwrap();
        s.visible_changed(set(&[A, B]));
        assert!(s.registry().is_empty());

        let loader = StaticManifestLoader::new(manifest(3));
        assert_eq!(s.load_manifest(&loader).await.unwrap(), 3);
        assert_eq!(s.registry().snapshot_keys(Stage::Fetch), set(&[A, B]));
        assert_eq!(s.record(C).unwrap().name(), "photo-2");
    }

    #[test]
    fn counts_reflect_states_and_registry() {
        let (mut s, _) = scheduler(3);
        mark_fetched(&mut s, B);
        s.reconcile(set(&[A]));

        let counts = s.counts();
        assert_eq!(counts.new, 2);
        assert_eq!(counts.fetched_raw, 1);
        assert_eq!(counts.in_flight_fetch, 1);
        assert_eq!(counts.in_flight_transform, 0);
        assert_eq!(counts.total(), 3);
    }

    #[tokio::test]
    async fn shutdown_cancels_everything() {
        let (mut s, _) = scheduler(2);
        s.reconcile(set(&[A, B]));
        s.shutdown();

        assert!(s.registry().is_empty());
        assert_eq!(s.queue(Stage::Fetch).pending_len(), 0);
        assert!(s.queue(Stage::Fetch).lease().await.is_none());
    }
}
