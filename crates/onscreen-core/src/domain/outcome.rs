//! Outcome model: what a work unit reports back to the control context.
//!
//! Workers never mutate records. They send a [`Completion`] and the control
//! context decides whether it still applies.

use bytes::Bytes;
use std::fmt;

use super::ids::{ItemId, UnitId};
use super::state::{ItemEvent, Stage};

/// Classification of a stage failure reported by a port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The transport could not reach or read the source.
    Transport,
    /// The port gave up after its own deadline.
    Timeout,
    /// The input (source location or payload) was unusable.
    InvalidInput,
    /// The transform itself failed.
    Processing,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Transport => write!(f, "transport error"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::InvalidInput => write!(f, "invalid input"),
            FailureKind::Processing => write!(f, "processing error"),
        }
    }
}

/// Error returned by the fetch and transform ports.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct StageFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl StageFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// How one execution of a unit ended.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitOutcome {
    /// The stage produced its output (raw payload for fetch, final result for transform).
    Succeeded(Bytes),
    Failed(StageFailure),
    /// The unit observed its cancel token, or never started.
    Cancelled,
}

impl UnitOutcome {
    /// State machine event for this outcome, `None` for cancellation.
    pub fn event(&self, stage: Stage) -> Option<ItemEvent> {
        match (self, stage) {
            (UnitOutcome::Succeeded(_), Stage::Fetch) => Some(ItemEvent::FetchSucceeded),
            (UnitOutcome::Failed(_), Stage::Fetch) => Some(ItemEvent::FetchFailed),
            (UnitOutcome::Succeeded(_), Stage::Transform) => Some(ItemEvent::TransformSucceeded),
            (UnitOutcome::Failed(_), Stage::Transform) => Some(ItemEvent::TransformFailed),
            (UnitOutcome::Cancelled, _) => None,
        }
    }
}

/// Message from a worker (or a queue, for never-started units) to the control context.
#[derive(Debug, Clone)]
pub struct Completion {
    pub unit_id: UnitId,
    pub item: ItemId,
    pub stage: Stage,
    pub outcome: UnitOutcome,
}

impl Completion {
    pub fn cancelled(unit_id: UnitId, item: ItemId, stage: Stage) -> Self {
        Self {
            unit_id,
            item,
            stage,
            outcome: UnitOutcome::Cancelled,
        }
    }
}

/// Why a completion was dropped without touching any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// The unit was cancelled before its result landed.
    CancelledAfterCompletion,
    /// The registry holds a different unit (or none) for this item and stage.
    Superseded,
    /// No record exists for the item.
    UnknownItem,
    /// The record is no longer in a state this stage can complete.
    InvalidTransition,
}

/// What the control context did with a completion.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionDisposition {
    Applied { item: ItemId, event: ItemEvent },
    Discarded(DiscardReason),
}
