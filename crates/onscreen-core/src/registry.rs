use std::collections::{HashMap, HashSet};

use crate::domain::{ItemId, Stage, UnitId};
use crate::error::SchedulerError;
use crate::queue::UnitHandle;

/// In-flight registry (stage, item) -> unit handle.
///
/// Design:
/// - Owned by the control context; never shared with workers, so no locks.
/// - One entry per (stage, item) at most. A second `register` is rejected,
///   which is the dedup guarantee for visible items.
/// - Entries are removed exactly once: on cancel or on completion.
#[derive(Debug, Default)]
pub struct InFlightRegistry {
    fetch: HashMap<ItemId, UnitHandle>,
    transform: HashMap<ItemId, UnitHandle>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self, stage: Stage) -> &HashMap<ItemId, UnitHandle> {
        match stage {
            Stage::Fetch => &self.fetch,
            Stage::Transform => &self.transform,
        }
    }

    fn map_mut(&mut self, stage: Stage) -> &mut HashMap<ItemId, UnitHandle> {
        match stage {
            Stage::Fetch => &mut self.fetch,
            Stage::Transform => &mut self.transform,
        }
    }

    /// Record a unit as in flight.
    pub fn register(
        &mut self,
        stage: Stage,
        item: ItemId,
        handle: UnitHandle,
    ) -> Result<(), SchedulerError> {
        let map = self.map_mut(stage);
        if map.contains_key(&item) {
            return Err(SchedulerError::AlreadyInFlight { stage, item });
        }
        map.insert(item, handle);
        Ok(())
    }

    /// Remove an entry. No-op if absent.
    pub fn unregister(&mut self, stage: Stage, item: ItemId) -> Option<UnitHandle> {
        self.map_mut(stage).remove(&item)
    }

    pub fn lookup(&self, stage: Stage, item: ItemId) -> Option<&UnitHandle> {
        self.map(stage).get(&item)
    }

    /// Is `unit_id` the unit currently registered for (stage, item)?
    pub fn is_current(&self, stage: Stage, item: ItemId, unit_id: UnitId) -> bool {
        self.lookup(stage, item).is_some_and(|h| h.unit_id() == unit_id)
    }

    /// Owned copy of the keys for one stage.
    pub fn snapshot_keys(&self, stage: Stage) -> HashSet<ItemId> {
        self.map(stage).keys().copied().collect()
    }

    /// Items with any stage in flight.
    pub fn in_flight_keys(&self) -> HashSet<ItemId> {
        let mut keys = self.snapshot_keys(Stage::Fetch);
        keys.extend(self.transform.keys().copied());
        keys
    }

    pub fn len(&self, stage: Stage) -> usize {
        self.map(stage).len()
    }

    pub fn is_empty(&self) -> bool {
        self.fetch.is_empty() && self.transform.is_empty()
    }
}
