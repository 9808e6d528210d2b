//! Scheduler configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::Stage;
use crate::error::SchedulerError;

/// Scheduler configuration, typically parsed from JSON.
///
/// Every field has a default, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Max fetch units executing at once.
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,

    /// Max transform units executing at once.
    #[serde(default = "default_transform_concurrency")]
    pub transform_concurrency: usize,

    /// Start the next stage of a visible item as soon as the previous one
    /// lands, instead of waiting for the next reconciliation pass. Never
    /// applies while the viewport is in motion.
    #[serde(default = "default_dispatch_on_completion")]
    pub dispatch_on_completion: bool,
}

fn default_fetch_concurrency() -> usize {
    4
}

fn default_transform_concurrency() -> usize {
    2
}

fn default_dispatch_on_completion() -> bool {
    true
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::default_v1()
    }
}

impl SchedulerConfig {
    pub fn default_v1() -> Self {
        Self {
            fetch_concurrency: default_fetch_concurrency(),
            transform_concurrency: default_transform_concurrency(),
            dispatch_on_completion: default_dispatch_on_completion(),
        }
    }

    /// Concurrency bound for `stage`.
    pub fn concurrency_for(&self, stage: Stage) -> usize {
        match stage {
            Stage::Fetch => self.fetch_concurrency,
            Stage::Transform => self.transform_concurrency,
        }
    }

    pub fn validate(&self) -> Result<(), SchedulerError> {
        for stage in Stage::ALL {
            if self.concurrency_for(stage) == 0 {
                return Err(SchedulerError::InvalidConfig(format!(
                    "{stage} concurrency must be at least 1"
                )));
            }
        }
        Ok(())
    }

    pub fn from_json(text: &str) -> Result<Self, SchedulerError> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| SchedulerError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, SchedulerError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SchedulerError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }
}
