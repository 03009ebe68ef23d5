//! Staging area configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use super::StagingLayout;

/// Staging store type discriminator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StagingStoreType {
    /// Filesystem-based storage (local development and tests).
    #[default]
    Filesystem,
    /// Amazon S3 (requires `s3` feature).
    #[cfg(feature = "s3")]
    S3,
}

/// Configuration for the staging area.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Staging store type.
    #[serde(rename = "type")]
    pub store_type: StagingStoreType,

    /// Prefix of the pending partition.
    pub pending_prefix: String,

    /// Prefix of the processed partition.
    pub processed_prefix: String,

    /// Deadline in seconds for each put / list / copy / delete.
    pub timeout_secs: u64,

    /// Age in hours after which processed objects are deleted by the loader.
    /// 0 disables cleanup (for buckets with a lifecycle rule instead).
    pub retention_hours: u64,

    /// Filesystem store configuration.
    pub filesystem: FilesystemStoreConfig,

    /// S3 store configuration (requires `s3` feature).
    #[cfg(feature = "s3")]
    pub s3: S3StoreConfig,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            store_type: StagingStoreType::default(),
            pending_prefix: "unprocessed".to_string(),
            processed_prefix: "processed".to_string(),
            timeout_secs: default_timeout_secs(),
            retention_hours: 0,
            filesystem: FilesystemStoreConfig::default(),
            #[cfg(feature = "s3")]
            s3: S3StoreConfig::default(),
        }
    }
}

impl StagingConfig {
    /// Pending/processed layout described by this config.
    pub fn layout(&self) -> StagingLayout {
        StagingLayout::new(&self.pending_prefix, &self.processed_prefix)
    }

    /// Per-operation deadline.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Retention for processed objects, or None if cleanup is disabled.
    pub fn retention(&self) -> Option<Duration> {
        if self.retention_hours > 0 {
            Some(Duration::from_secs(self.retention_hours * 3600))
        } else {
            None
        }
    }
}

fn default_timeout_secs() -> u64 {
    5
}

/// Filesystem staging store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilesystemStoreConfig {
    /// Root directory; object keys are paths relative to it.
    pub base_path: PathBuf,
}

impl Default for FilesystemStoreConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("/tmp/cdcflow/staging"),
        }
    }
}

/// S3 staging store configuration.
#[cfg(feature = "s3")]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct S3StoreConfig {
    /// S3 bucket name.
    pub bucket: String,
    /// AWS region.
    pub region: Option<String>,
    /// Custom endpoint URL (for S3-compatible services like MinIO).
    pub endpoint: Option<String>,
}

#[cfg(feature = "s3")]
impl Default for S3StoreConfig {
    fn default() -> Self {
        Self {
            bucket: "cdcflow-staging".to_string(),
            region: None,
            endpoint: None,
        }
    }
}
