use thiserror::Error;

use crate::domain::{ItemEvent, ItemId, ItemState, Stage};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("manifest load failed: {0}")]
    ManifestLoadFailed(String),

    #[error("fetch failed: {0}")]
    FetchFailed(String),

    #[error("transform failed: {0}")]
    TransformFailed(String),

    #[error("{stage} already in flight for {item}")]
    AlreadyInFlight { stage: Stage, item: ItemId },

    #[error("unknown item {0}")]
    UnknownItem(ItemId),

    #[error("invalid transition for {item}: {event:?} in state {from}")]
    InvalidTransition {
        item: ItemId,
        from: ItemState,
        event: ItemEvent,
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl SchedulerError {
    /// Wrap a stage failure message in the error kind of its stage.
    pub fn stage_failed(stage: Stage, message: impl Into<String>) -> Self {
        match stage {
            Stage::Fetch => SchedulerError::FetchFailed(message.into()),
            Stage::Transform => SchedulerError::TransformFailed(message.into()),
        }
    }
}
