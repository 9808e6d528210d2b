use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::{Manifest, ManifestEntry, SourceLocation};
use crate::error::SchedulerError;
use crate::ports::ManifestLoader;

const SUPPORTED_SCHEMES: [&str; 3] = ["http", "https", "file"];

enum JsonSource {
    Text(String),
    File(PathBuf),
}

/// Reads a manifest from a JSON object of `"name": "location"` pairs.
///
/// Entries come out ordered by name. Locations that do not parse as a URL, or
/// whose scheme is not `http`, `https` or `file`, are skipped.
pub struct JsonManifestLoader {
    source: JsonSource,
}

impl JsonManifestLoader {
    pub fn from_json(text: impl Into<String>) -> Self {
        Self {
            source: JsonSource::Text(text.into()),
        }
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: JsonSource::File(path.into()),
        }
    }

    pub fn parse(text: &str) -> Result<Manifest, SchedulerError> {
        let map: BTreeMap<String, String> = serde_json::from_str(text)
            .map_err(|e| SchedulerError::ManifestLoadFailed(e.to_string()))?;

        let mut skipped = 0usize;
        let manifest: Manifest = map
            .into_iter()
            .filter(|(name, location)| {
                let supported = SourceLocation::new(location.as_str())
                    .scheme()
                    .is_some_and(|s| SUPPORTED_SCHEMES.contains(&s.as_str()));
                if !supported {
                    warn!(name = %name, location = %location, "unsupported location, skipped");
                    skipped += 1;
                }
                supported
            })
            .map(|(name, location)| ManifestEntry::new(name, location))
            .collect();

        debug!(entries = manifest.len(), skipped, "manifest parsed");
        Ok(manifest)
    }
}

#[async_trait]
impl ManifestLoader for JsonManifestLoader {
    async fn load(&self) -> Result<Manifest, SchedulerError> {
        match &self.source {
            JsonSource::Text(text) => Self::parse(text),
            JsonSource::File(path) => {
                let text = tokio::fs::read_to_string(path).await.map_err(|e| {
                    SchedulerError::ManifestLoadFailed(format!("{}: {e}", path.display()))
                })?;
                Self::parse(&text)
            }
        }
    }
}

/// Fixed manifest, or a fixed failure.
pub struct StaticManifestLoader {
    result: Result<Manifest, String>,
}

impl StaticManifestLoader {
    pub fn new(manifest: Manifest) -> Self {
        Self {
            result: Ok(manifest),
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            result: Err(reason.into()),
        }
    }
}

#[async_trait]
impl ManifestLoader for StaticManifestLoader {
    async fn load(&self) -> Result<Manifest, SchedulerError> {
        self.result
            .clone()
            .map_err(SchedulerError::ManifestLoadFailed)
    }
}
