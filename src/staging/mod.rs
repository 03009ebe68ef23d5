//! Staging area shared by the stream writer and the loader.
//!
//! One object namespace, two partitions:
//! ```text
//! {pending_prefix}/{ts}__{uuid}__{count}__inserted_or_modified_records.json
//! {pending_prefix}/{ts}__{uuid}__no_inserted_or_modified_records.txt
//! {processed_prefix}/<same file name>
//! ```
//!
//! The stream writer is the only producer; the loader is the only consumer
//! and the only party that moves objects. Objects are immutable once put.
//!
//! ## Storage Backends
//!
//! - `FilesystemStagingStore` - Local directory tree
//! - `S3StagingStore` (feature: s3) - Amazon S3 bucket
//! - `MockStagingStore` - In memory with failure injection

mod config;
mod filesystem;
mod key;
pub mod mock;
mod reaper;
#[cfg(feature = "s3")]
mod s3;
mod writer;

#[cfg(feature = "s3")]
pub use config::S3StoreConfig;
pub use config::{FilesystemStoreConfig, StagingConfig, StagingStoreType};
pub use filesystem::FilesystemStagingStore;
pub use key::{
    staged_file_name, StagedObjectKind, StagingLayout, DATA_SUFFIX, EMPTY_MARKER_SUFFIX,
    TIMESTAMP_FORMAT,
};
pub use mock::MockStagingStore;
pub use reaper::ProcessedReaper;
#[cfg(feature = "s3")]
pub use s3::S3StagingStore;
pub use writer::{encode_records, StagedBatch, StagingWriter};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::change::UnrepresentableNumber;

/// Errors that can occur during staging store operations.
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("Failed to put {key}: {reason}")]
    PutFailed { key: String, reason: String },

    #[error("Failed to get {key}: {reason}")]
    GetFailed { key: String, reason: String },

    #[error("Staged object not found: {0}")]
    NotFound(String),

    #[error("Failed to list {prefix}: {reason}")]
    ListFailed { prefix: String, reason: String },

    #[error("Failed to copy {from} to {to}: {reason}")]
    CopyFailed {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Failed to delete {key}: {reason}")]
    DeleteFailed { key: String, reason: String },

    #[error("Failed to encode staged records: {0}")]
    Encode(#[from] UnrepresentableNumber),

    #[error("Key {key} is outside the {prefix} partition")]
    OutsidePartition { key: String, prefix: String },

    #[error("{operation} on {key} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        key: String,
        after: Duration,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for staging store operations.
pub type Result<T> = std::result::Result<T, StagingError>;

/// Object storage backing the staging area.
///
/// Keys are full object keys (`unprocessed/2024-...json`). A `put` must be
/// atomic from a reader's point of view: `list` never returns a key whose
/// body is incomplete.
#[async_trait]
pub trait StagingStore: Send + Sync {
    /// Store an object, replacing any existing body.
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()>;

    /// Read an object body.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Whether an object exists under `key`.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Keys directly under `prefix` (one level, no recursion), sorted.
    ///
    /// `prefix` ends with `/`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Copy an object to a new key.
    async fn copy(&self, from: &str, to: &str) -> Result<()>;

    /// Delete an object.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete objects directly under `prefix` last modified before `age` ago.
    ///
    /// Returns the number of objects deleted.
    async fn delete_older_than(&self, prefix: &str, age: Duration) -> Result<usize>;

    /// URI the warehouse loads the object from.
    fn uri(&self, key: &str) -> String;

    /// Backend name for logs.
    fn storage_type(&self) -> &'static str;

    /// Relocate an object: copy, then delete the source.
    ///
    /// A failure after the copy leaves the object under both keys; the
    /// source is still authoritative and the move can be retried.
    async fn move_object(&self, from: &str, to: &str) -> Result<()> {
        self.copy(from, to).await?;
        self.delete(from).await
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Initialize a staging store based on configuration.
///
/// # Errors
///
/// Returns error if the configured store type requires an unavailable feature
/// or the backend can not be reached.
pub async fn init_staging_store(
    config: &StagingConfig,
) -> std::result::Result<Arc<dyn StagingStore>, Box<dyn std::error::Error + Send + Sync>> {
    use tracing::info;

    match config.store_type {
        StagingStoreType::Filesystem => {
            info!(
                path = %config.filesystem.base_path.display(),
                "StagingStore: filesystem"
            );
            let store = FilesystemStagingStore::new(&config.filesystem.base_path).await?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "s3")]
        StagingStoreType::S3 => {
            info!(
                bucket = %config.s3.bucket,
                region = ?config.s3.region,
                endpoint = ?config.s3.endpoint,
                "StagingStore: s3"
            );
            let store = match &config.s3.endpoint {
                Some(endpoint) => {
                    S3StagingStore::with_endpoint(
                        &config.s3.bucket,
                        endpoint,
                        config.s3.region.as_deref(),
                    )
                    .await
                }
                None => S3StagingStore::new(&config.s3.bucket, config.s3.region.as_deref()).await,
            };
            Ok(Arc::new(store))
        }
    }
}
