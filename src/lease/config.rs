//! Lease configuration.

use std::time::Duration;

use serde::Deserialize;

/// Lease store type discriminator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaseStoreType {
    /// In-process leases. Only excludes concurrent drains in one process.
    #[default]
    Memory,
    /// DynamoDB conditional writes (requires `dynamo` feature).
    #[cfg(feature = "dynamo")]
    Dynamo,
}

/// Configuration for per-object leasing in the loader.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LeaseConfig {
    pub enabled: bool,

    #[serde(rename = "type")]
    pub store_type: LeaseStoreType,

    /// DynamoDB table with string partition key `pk`.
    pub table_name: String,

    /// Custom endpoint URL (for DynamoDB Local / LocalStack).
    pub endpoint: Option<String>,

    /// Lease lifetime. Should exceed the loader's per-object load + move time.
    pub ttl_secs: u64,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            store_type: LeaseStoreType::default(),
            table_name: "cdcflow-leases".to_string(),
            endpoint: None,
            ttl_secs: 60,
        }
    }
}

impl LeaseConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}
