use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::domain::StateChange;
use crate::ports::StateSink;

/// Forwards every change to an unbounded channel. A closed receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelStateSink {
    tx: mpsc::UnboundedSender<StateChange>,
}

impl ChannelStateSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StateChange>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StateSink for ChannelStateSink {
    fn emit(&self, change: StateChange) {
        let _ = self.tx.send(change);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStateSink;

impl StateSink for NoopStateSink {
    fn emit(&self, _change: StateChange) {}
}

/// Keeps every change in memory.
#[derive(Debug, Default)]
pub struct RecordingStateSink {
    changes: Mutex<Vec<StateChange>>,
}

impl RecordingStateSink {
    pub fn changes(&self) -> Vec<StateChange> {
        self.changes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl StateSink for RecordingStateSink {
    fn emit(&self, change: StateChange) {
        self.changes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(change);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ItemId, ItemState};
    use chrono::Utc;

    fn change(item: u64, state: ItemState) -> StateChange {
        StateChange {
            item: ItemId::new(item),
            state,
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn channel_sink_forwards_in_order() {
        let (sink, mut rx) = ChannelStateSink::new();
        sink.emit(change(1, ItemState::FetchedRaw));
        sink.emit(change(1, ItemState::Ready));

        assert_eq!(rx.recv().await.unwrap().state, ItemState::FetchedRaw);
        assert_eq!(rx.recv().await.unwrap().state, ItemState::Ready);
    }

    #[test]
    fn channel_sink_survives_closed_receiver() {
        let (sink, rx) = ChannelStateSink::new();
        drop(rx);
        sink.emit(change(1, ItemState::Failed));
    }

    #[test]
    fn recording_sink_keeps_history() {
        let sink = RecordingStateSink::default();
        sink.emit(change(2, ItemState::New));
        assert_eq!(sink.changes().len(), 1);
        assert_eq!(sink.changes()[0].item, ItemId::new(2));
    }
}
