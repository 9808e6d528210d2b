use std::sync::Arc;

use bytes::Bytes;

use crate::domain::{StageFailure, UnitOutcome};
use crate::ports::{FetchTransport, TransformEngine};
use crate::queue::{UnitInput, WorkUnit};

/// Runtime executes a `WorkUnit` by dispatching its input to the matching port.
///
/// The body checks the cancel token before the port call and after it, and
/// races the call itself against the token. A cancelled unit always reports
/// `UnitOutcome::Cancelled`, whatever the port returned.
pub struct Runtime {
    transport: Arc<dyn FetchTransport>,
    engine: Arc<dyn TransformEngine>,
}

impl Runtime {
    pub fn new(transport: Arc<dyn FetchTransport>, engine: Arc<dyn TransformEngine>) -> Self {
        Self { transport, engine }
    }

    /// Execute one unit.
    pub async fn execute(&self, unit: &WorkUnit) -> UnitOutcome {
        let cancel = unit.cancel_token();
        if cancel.is_cancelled() {
            return UnitOutcome::Cancelled;
        }

        let result: Result<Bytes, StageFailure> = tokio::select! {
            biased;
            _ = cancel.cancelled() => return UnitOutcome::Cancelled,
            result = self.run_body(unit) => result,
        };

        if cancel.is_cancelled() {
            return UnitOutcome::Cancelled;
        }
        match result {
            Ok(bytes) => UnitOutcome::Succeeded(bytes),
            Err(failure) => UnitOutcome::Failed(failure),
        }
    }

    async fn run_body(&self, unit: &WorkUnit) -> Result<Bytes, StageFailure> {
        match unit.input() {
            UnitInput::Fetch(source) => self.transport.fetch(source, unit.cancel_token()).await,
            UnitInput::Transform(raw) => self.engine.transform(raw, unit.cancel_token()).await,
        }
    }
}
