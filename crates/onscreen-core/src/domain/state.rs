//! Item state machine and processing stages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Processing stage of a work unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Transform,
}

impl Stage {
    pub const ALL: [Stage; 2] = [Stage::Fetch, Stage::Transform];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Transform => "transform",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Item state.
///
/// State transitions:
/// - New -> FetchedRaw (fetch succeeded)
/// - New -> Failed (fetch failed)
/// - FetchedRaw -> Ready (transform succeeded)
/// - FetchedRaw -> Failed (transform failed)
///
/// Cancellation never moves an item. `Failed -> New` only happens through an
/// explicit reset, never through [`ItemState::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    New,
    FetchedRaw,
    Ready,
    Failed,
}

/// Result of a stage, as seen by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemEvent {
    FetchSucceeded,
    FetchFailed,
    TransformSucceeded,
    TransformFailed,
}

impl ItemState {
    /// The stage this item needs next, if any.
    pub fn next_stage(self) -> Option<Stage> {
        match self {
            ItemState::New => Some(Stage::Fetch),
            ItemState::FetchedRaw => Some(Stage::Transform),
            ItemState::Ready | ItemState::Failed => None,
        }
    }

    /// Target state for `event`, or `None` if the transition is not allowed.
    pub fn apply(self, event: ItemEvent) -> Option<ItemState> {
        match (self, event) {
            (ItemState::New, ItemEvent::FetchSucceeded) => Some(ItemState::FetchedRaw),
            (ItemState::New, ItemEvent::FetchFailed) => Some(ItemState::Failed),
            (ItemState::FetchedRaw, ItemEvent::TransformSucceeded) => Some(ItemState::Ready),
            (ItemState::FetchedRaw, ItemEvent::TransformFailed) => Some(ItemState::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ItemState::New => "new",
            ItemState::FetchedRaw => "fetched_raw",
            ItemState::Ready => "ready",
            ItemState::Failed => "failed",
        };
        f.write_str(s)
    }
}
