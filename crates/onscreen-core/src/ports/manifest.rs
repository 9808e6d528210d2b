//! ManifestLoader port - produces the item list once.

use async_trait::async_trait;

use crate::domain::Manifest;
use crate::error::SchedulerError;

/// Loads the complete item set.
///
/// All or nothing: on any failure the loader returns
/// [`SchedulerError::ManifestLoadFailed`] and no partial manifest.
#[async_trait]
pub trait ManifestLoader: Send + Sync {
    async fn load(&self) -> Result<Manifest, SchedulerError>;
}
