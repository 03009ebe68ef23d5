//! DynamoDB lease store.
//!
//! Table schema:
//! - PK: `pk` (String), the leased object key
//! - holder: invocation holding the lease (String)
//! - expires_at: lease expiry, epoch seconds (Number). Also usable as the
//!   table's TTL attribute so stale rows disappear on their own.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use chrono::Utc;
use tracing::debug;

use super::{LeaseError, LeaseStore, Result};

/// DynamoDB implementation of LeaseStore.
pub struct DynamoLeaseStore {
    client: Client,
    table_name: String,
}

impl DynamoLeaseStore {
    /// Create a new DynamoDB lease store.
    pub async fn new(table_name: impl Into<String>, endpoint_url: Option<&str>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

        let client = if let Some(endpoint) = endpoint_url {
            let dynamo_config = aws_sdk_dynamodb::config::Builder::from(&config)
                .endpoint_url(endpoint)
                .build();
            Client::from_conf(dynamo_config)
        } else {
            Client::new(&config)
        };

        Self::with_client(client, table_name)
    }

    /// Create with explicit client (for testing).
    pub fn with_client(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    fn lease_item(key: &str, holder: &str, expires_at: i64) -> HashMap<String, AttributeValue> {
        let mut item = HashMap::new();
        item.insert("pk".to_string(), AttributeValue::S(key.to_string()));
        item.insert("holder".to_string(), AttributeValue::S(holder.to_string()));
        item.insert(
            "expires_at".to_string(),
            AttributeValue::N(expires_at.to_string()),
        );
        item
    }
}

#[async_trait]
impl LeaseStore for DynamoLeaseStore {
    async fn acquire(&self, key: &str, holder: &str, ttl: Duration) -> Result<bool> {
        let now = Utc::now().timestamp();
        let expires_at = now + ttl.as_secs() as i64;

        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(Self::lease_item(key, holder, expires_at)))
            .condition_expression(
                "attribute_not_exists(pk) OR expires_at < :now OR holder = :holder",
            )
            .expression_attribute_values(":now", AttributeValue::N(now.to_string()))
            .expression_attribute_values(":holder", AttributeValue::S(holder.to_string()))
            .send()
            .await;

        match result {
            Ok(_) => {
                debug!(key = %key, holder = %holder, expires_at, "Acquired lease");
                Ok(true)
            }
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception()) =>
            {
                debug!(key = %key, holder = %holder, "Lease held elsewhere");
                Ok(false)
            }
            Err(e) => Err(LeaseError::Backend {
                operation: "acquire",
                key: key.to_string(),
                reason: format!("DynamoDB put_item failed: {}", e),
            }),
        }
    }

    async fn release(&self, key: &str, holder: &str) -> Result<()> {
        let result = self
            .client
            .delete_item()
            .table_name(&self.table_name)
            .key("pk", AttributeValue::S(key.to_string()))
            .condition_expression("holder = :holder")
            .expression_attribute_values(":holder", AttributeValue::S(holder.to_string()))
            .send()
            .await;

        match result {
            Ok(_) => {
                debug!(key = %key, holder = %holder, "Released lease");
                Ok(())
            }
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception()) =>
            {
                Ok(())
            }
            Err(e) => Err(LeaseError::Backend {
                operation: "release",
                key: key.to_string(),
                reason: format!("DynamoDB delete_item failed: {}", e),
            }),
        }
    }

    fn backend(&self) -> &'static str {
        "dynamo"
    }
}
