//! TransformEngine port - turns a raw payload into the final result.

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::domain::StageFailure;

#[async_trait]
pub trait TransformEngine: Send + Sync {
    async fn transform(
        &self,
        raw_payload: &Bytes,
        cancel: &CancellationToken,
    ) -> Result<Bytes, StageFailure>;
}
