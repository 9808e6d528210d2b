//! Work unit: one cancelable execution of one stage for one item.

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::domain::{ItemId, SourceLocation, Stage, UnitId};

/// What the unit body needs as input.
#[derive(Debug, Clone)]
pub enum UnitInput {
    Fetch(SourceLocation),
    Transform(Bytes),
}

/// A unit waiting in (or leased from) a stage queue.
///
/// The queue owns execution; the registry only keeps a [`UnitHandle`]
/// for routing cancellation.
#[derive(Debug, Clone)]
pub struct WorkUnit {
    unit_id: UnitId,
    item: ItemId,
    input: UnitInput,
    cancel: CancellationToken,
}

impl WorkUnit {
    pub fn fetch(item: ItemId, source: SourceLocation) -> Self {
        Self::new(item, UnitInput::Fetch(source))
    }

    pub fn transform(item: ItemId, raw_payload: Bytes) -> Self {
        Self::new(item, UnitInput::Transform(raw_payload))
    }

    fn new(item: ItemId, input: UnitInput) -> Self {
        Self {
            unit_id: UnitId::generate(),
            item,
            input,
            cancel: CancellationToken::new(),
        }
    }

    pub fn unit_id(&self) -> UnitId {
        self.unit_id
    }

    pub fn item(&self) -> ItemId {
        self.item
    }

    pub fn stage(&self) -> Stage {
        match self.input {
            UnitInput::Fetch(_) => Stage::Fetch,
            UnitInput::Transform(_) => Stage::Transform,
        }
    }

    pub fn input(&self) -> &UnitInput {
        &self.input
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn handle(&self) -> UnitHandle {
        UnitHandle {
            unit_id: self.unit_id,
            cancel: self.cancel.clone(),
        }
    }
}

/// Registry-side view of a unit: enough to identify and cancel it.
#[derive(Debug, Clone)]
pub struct UnitHandle {
    unit_id: UnitId,
    cancel: CancellationToken,
}

impl UnitHandle {
    pub fn unit_id(&self) -> UnitId {
        self.unit_id
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
