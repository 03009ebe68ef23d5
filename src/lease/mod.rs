//! Per-object leases for the loader.
//!
//! Overlapping loader invocations would otherwise both load the same pending
//! object. A lease keyed by the object key is acquired before the load and
//! released after the move; a crashed holder's lease expires after its TTL.
//!
//! ## Backends
//!
//! - `InMemoryLeaseStore` - Single process (tests, local runs)
//! - `DynamoLeaseStore` (feature: dynamo) - Conditional writes on a DynamoDB table

mod config;
#[cfg(feature = "dynamo")]
mod dynamo;
mod memory;

pub use config::{LeaseConfig, LeaseStoreType};
#[cfg(feature = "dynamo")]
pub use dynamo::DynamoLeaseStore;
pub use memory::InMemoryLeaseStore;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during lease operations.
#[derive(Debug, Error)]
pub enum LeaseError {
    #[error("Lease {operation} failed for {key}: {reason}")]
    Backend {
        operation: &'static str,
        key: String,
        reason: String,
    },

    #[error("Lease {operation} timed out for {key} after {after:?}")]
    Timeout {
        operation: &'static str,
        key: String,
        after: Duration,
    },
}

/// Result type for lease operations.
pub type Result<T> = std::result::Result<T, LeaseError>;

/// Exclusive, expiring claims on string keys.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Try to claim `key` for `holder` for `ttl`.
    ///
    /// Returns false if another holder has an unexpired lease. Re-acquiring
    /// a lease already held by `holder` renews it.
    async fn acquire(&self, key: &str, holder: &str, ttl: Duration) -> Result<bool>;

    /// Give up `holder`'s lease on `key`. Releasing a lease that expired or
    /// was taken over is not an error.
    async fn release(&self, key: &str, holder: &str) -> Result<()>;

    /// Backend name for logs.
    fn backend(&self) -> &'static str;
}

/// Initialize the lease store, or None when leasing is disabled.
///
/// # Errors
///
/// Returns error if the configured store type requires an unavailable feature.
pub async fn init_lease_store(
    config: &LeaseConfig,
) -> std::result::Result<Option<Arc<dyn LeaseStore>>, Box<dyn std::error::Error + Send + Sync>> {
    use tracing::info;

    if !config.enabled {
        info!("LeaseStore: disabled");
        return Ok(None);
    }

    match config.store_type {
        LeaseStoreType::Memory => {
            info!(ttl_secs = config.ttl_secs, "LeaseStore: memory");
            Ok(Some(Arc::new(InMemoryLeaseStore::new())))
        }
        #[cfg(feature = "dynamo")]
        LeaseStoreType::Dynamo => {
            info!(
                table = %config.table_name,
                endpoint = ?config.endpoint,
                ttl_secs = config.ttl_secs,
                "LeaseStore: dynamo"
            );
            let store =
                DynamoLeaseStore::new(&config.table_name, config.endpoint.as_deref()).await;
            Ok(Some(Arc::new(store)))
        }
    }
}
