//! Item record: per-item state + cached stage outputs.

use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::ids::ItemId;
use super::manifest::SourceLocation;
use super::outcome::UnitOutcome;
use super::state::{ItemEvent, ItemState, Stage};
use crate::error::SchedulerError;

/// Single source of truth for one item.
///
/// - Owned by the control context only.
/// - All state transitions go through the methods below; a rejected
///   transition leaves the record untouched.
/// - `raw_payload` is set only in `FetchedRaw`/`Ready`, `final_result` only in `Ready`.
#[derive(Debug, Clone)]
pub struct ItemRecord {
    id: ItemId,
    name: String,
    source: SourceLocation,
    state: ItemState,
    raw_payload: Option<Bytes>,
    final_result: Option<Bytes>,
    last_error: Option<String>,
    updated_at: DateTime<Utc>,
}

impl ItemRecord {
    pub fn new(id: ItemId, name: impl Into<String>, source: SourceLocation) -> Self {
        Self {
            id,
            name: name.into(),
            source,
            state: ItemState::New,
            raw_payload: None,
            final_result: None,
            last_error: None,
            updated_at: Utc::now(),
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &SourceLocation {
        &self.source
    }

    pub fn state(&self) -> ItemState {
        self.state
    }

    pub fn raw_payload(&self) -> Option<&Bytes> {
        self.raw_payload.as_ref()
    }

    pub fn final_result(&self) -> Option<&Bytes> {
        self.final_result.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Apply the result of a finished stage.
    ///
    /// Returns the event that was applied, `None` for a cancelled unit (which
    /// leaves the record as it was).
    pub fn complete_stage(
        &mut self,
        stage: Stage,
        outcome: UnitOutcome,
    ) -> Result<Option<ItemEvent>, SchedulerError> {
        let Some(event) = outcome.event(stage) else {
            return Ok(None);
        };
        let next = self
            .state
            .apply(event)
            .ok_or(SchedulerError::InvalidTransition {
                item: self.id,
                from: self.state,
                event,
            })?;

        match outcome {
            UnitOutcome::Succeeded(bytes) if stage == Stage::Fetch => {
                self.raw_payload = Some(bytes);
            }
            UnitOutcome::Succeeded(bytes) => self.final_result = Some(bytes),
            UnitOutcome::Failed(failure) => {
                self.raw_payload = None;
                self.final_result = None;
                self.last_error = Some(failure.to_string());
            }
            UnitOutcome::Cancelled => {}
        }
        self.state = next;
        self.updated_at = Utc::now();
        Ok(Some(event))
    }

    /// Re-arm a failed item so it can be scheduled again.
    ///
    /// Returns `false` (and does nothing) unless the item is `Failed`.
    pub fn reset(&mut self) -> bool {
        if self.state != ItemState::Failed {
            return false;
        }
        self.state = ItemState::New;
        self.raw_payload = None;
        self.final_result = None;
        self.last_error = None;
        self.updated_at = Utc::now();
        true
    }
}
