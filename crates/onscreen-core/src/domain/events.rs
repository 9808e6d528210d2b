//! Events crossing the core boundary.
//!
//! - [`ViewportEvent`]: display layer -> core (visibility and motion).
//! - [`StateChange`]: core -> display layer, once per record transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::ids::ItemId;
use super::record::ItemRecord;
use super::state::ItemState;

/// Report from the visibility reporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewportEvent {
    /// Continuous motion began (drag/fling). Queues suspend until it settles.
    MotionStarted,
    /// Motion ended; `visible` is what is on screen now.
    MotionSettled { visible: HashSet<ItemId> },
    /// The visible set changed without motion (initial load, resize, jump).
    VisibleChanged { visible: HashSet<ItemId> },
}

/// Notification that one item moved to a new state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub item: ItemId,
    pub state: ItemState,
    pub at: DateTime<Utc>,
}

impl StateChange {
    /// Current state of `record`, stamped with its last transition time.
    pub fn from_record(record: &ItemRecord) -> Self {
        Self {
            item: record.id(),
            state: record.state(),
            at: record.updated_at(),
        }
    }
}
