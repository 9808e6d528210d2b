use std::hash::{DefaultHasher, Hash, Hasher};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use tokio_util::sync::CancellationToken;

use crate::domain::{FailureKind, SourceLocation, StageFailure};
use crate::ports::FetchTransport;

/// 16x16 RGB8.
const DEFAULT_PAYLOAD_LEN: usize = 16 * 16 * 3;

/// Fetch transport that only waits.
///
/// The payload is derived from the source location, so the same source always
/// yields the same bytes. Sources containing `fail` fail with a transport error.
#[derive(Debug, Clone)]
pub struct SimulatedTransport {
    latency: Duration,
    jitter: Duration,
    payload_len: usize,
}

impl SimulatedTransport {
    pub fn new(latency: Duration, jitter: Duration) -> Self {
        Self {
            latency,
            jitter,
            payload_len: DEFAULT_PAYLOAD_LEN,
        }
    }

    /// No latency at all.
    pub fn instant() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn with_payload_len(mut self, len: usize) -> Self {
        self.payload_len = len;
        self
    }

    fn delay(&self) -> Duration {
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        if jitter_ms == 0 {
            return self.latency;
        }
        let extra = Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms));
        self.latency.saturating_add(extra)
    }

    fn payload(&self, source: &SourceLocation) -> Bytes {
        let mut hasher = DefaultHasher::new();
        source.as_str().hash(&mut hasher);
        let mut rng = StdRng::seed_from_u64(hasher.finish());
        let mut buf = vec![0u8; self.payload_len];
        rng.fill_bytes(&mut buf);
        Bytes::from(buf)
    }
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new(Duration::from_millis(150), Duration::from_millis(100))
    }
}

#[async_trait]
impl FetchTransport for SimulatedTransport {
    async fn fetch(
        &self,
        source: &SourceLocation,
        cancel: &CancellationToken,
    ) -> Result<Bytes, StageFailure> {
        if source.parse().is_none() {
            return Err(StageFailure::new(
                FailureKind::InvalidInput,
                format!("not a location: {source}"),
            ));
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(StageFailure::new(FailureKind::Transport, "cancelled"));
            }
            _ = tokio::time::sleep(self.delay()) => {}
        }

        if source.as_str().contains("fail") {
            return Err(StageFailure::new(
                FailureKind::Transport,
                format!("unreachable: {source}"),
            ));
        }
        Ok(self.payload(source))
    }
}
