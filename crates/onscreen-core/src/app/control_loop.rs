//! Control loop: the only task that touches the scheduler.
//!
//! Viewport events and completions are interleaved one at a time, so the
//! records and the registry never see concurrent mutation.

use tokio::sync::mpsc;
use tracing::debug;

use crate::app::builder::App;
use crate::domain::ViewportEvent;

impl App {
    /// Process viewport events and completions until `events` closes.
    pub async fn run(&mut self, mut events: mpsc::Receiver<ViewportEvent>) {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        self.scheduler.handle_viewport(event);
                    }
                    None => break,
                },
                Some(completion) = self.scheduler.next_completion() => {
                    self.scheduler.apply_completion(completion);
                }
            }
        }
        debug!("viewport channel closed");
    }

    /// Apply completions until no unit is in flight.
    ///
    /// Returns at once while the viewport is in motion: suspended queues
    /// would never drain.
    pub async fn run_until_idle(&mut self) {
        while !self.scheduler.in_motion() && !self.scheduler.registry().is_empty() {
            let Some(completion) = self.scheduler.next_completion().await else {
                break;
            };
            self.scheduler.apply_completion(completion);
        }
    }
}
