//! FetchTransport port - the byte-fetching collaborator.

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::domain::{SourceLocation, StageFailure};

/// Fetches the raw payload for one source location.
///
/// Implementations may watch `cancel` mid-call and return early; the worker
/// also races the call against the token, so a transport that ignores it is
/// still abandoned promptly. Timeouts are the transport's business.
#[async_trait]
pub trait FetchTransport: Send + Sync {
    async fn fetch(
        &self,
        source: &SourceLocation,
        cancel: &CancellationToken,
    ) -> Result<Bytes, StageFailure>;
}
