//! Domain model (ids, states, records, outcomes, events).

pub mod events;
pub mod ids;
pub mod manifest;
pub mod outcome;
pub mod record;
pub mod state;

pub use events::{StateChange, ViewportEvent};
pub use ids::{ItemId, UnitId};
pub use manifest::{Manifest, ManifestEntry, SourceLocation};
pub use outcome::{
    Completion, CompletionDisposition, DiscardReason, FailureKind, StageFailure, UnitOutcome,
};
pub use record::ItemRecord;
pub use state::{ItemEvent, ItemState, Stage};
