use serde::{Deserialize, Serialize};

use crate::domain::ItemState;

/// Item counts by state, plus what is queued and running right now.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCounts {
    pub new: usize,
    pub fetched_raw: usize,
    pub ready: usize,
    pub failed: usize,
    pub in_flight_fetch: usize,
    pub in_flight_transform: usize,
}

impl ItemCounts {
    pub fn record(&mut self, state: ItemState) {
        match state {
            ItemState::New => self.new += 1,
            ItemState::FetchedRaw => self.fetched_raw += 1,
            ItemState::Ready => self.ready += 1,
            ItemState::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.new + self.fetched_raw + self.ready + self.failed
    }
}
