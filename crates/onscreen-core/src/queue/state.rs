//! Dispatch state of a stage queue.

use serde::{Deserialize, Serialize};

/// Whether pending units may begin execution.
///
/// - Running -> Suspended: viewport motion started
/// - Suspended -> Running: motion settled (pending order is kept as is)
///
/// Units that already started are not affected by either transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueState {
    Running,
    Suspended,
}

impl QueueState {
    /// May a pending unit be handed to a worker now?
    pub fn admits_dispatch(self) -> bool {
        matches!(self, QueueState::Running)
    }
}
