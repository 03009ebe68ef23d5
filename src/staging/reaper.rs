//! Retention cleanup for the processed partition.
//!
//! Deployments that rely on a bucket lifecycle rule leave this disabled
//! (`retention_hours: 0`). Otherwise the loader runs one pass per invocation.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::{Result, StagingStore};

/// Deletes processed objects older than the retention period.
pub struct ProcessedReaper {
    store: Arc<dyn StagingStore>,
    prefix: String,
    retention: Duration,
}

impl ProcessedReaper {
    /// Create a reaper over the partition directory `prefix` (ending with `/`).
    pub fn new(store: Arc<dyn StagingStore>, prefix: impl Into<String>, retention: Duration) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            retention,
        }
    }

    /// Run cleanup once. Returns the number of objects deleted.
    pub async fn run_once(&self) -> Result<usize> {
        let deleted = self
            .store
            .delete_older_than(&self.prefix, self.retention)
            .await?;
        if deleted > 0 {
            info!(
                deleted,
                prefix = %self.prefix,
                retention_hours = self.retention.as_secs() / 3600,
                "Reaper cleaned up processed objects"
            );
        }
        Ok(deleted)
    }
}
