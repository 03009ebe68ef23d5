//! Mock warehouse for testing.
//!
//! Records every statement it is given. `CREATE ... IF NOT EXISTS` statements
//! are tracked as a set of created objects so repeat bootstraps can be
//! checked for idempotence.

use std::collections::BTreeSet;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Result, Warehouse, WarehouseError};

const IF_NOT_EXISTS: &str = " IF NOT EXISTS ";

/// Mock warehouse that records statements in memory.
#[derive(Default)]
pub struct MockWarehouse {
    statements: RwLock<Vec<String>>,
    created: RwLock<BTreeSet<String>>,
    loads: RwLock<Vec<String>>,
    fail_all: RwLock<bool>,
    fail_copy_matching: RwLock<Option<String>>,
}

impl MockWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every statement.
    pub async fn set_fail_all(&self, fail: bool) {
        *self.fail_all.write().await = fail;
    }

    /// Fail `COPY` statements containing `pattern` (typically an object key).
    pub async fn set_fail_copy_matching(&self, pattern: Option<&str>) {
        *self.fail_copy_matching.write().await = pattern.map(str::to_string);
    }

    /// Every statement that executed successfully, in order.
    pub async fn statements(&self) -> Vec<String> {
        self.statements.read().await.clone()
    }

    /// Successful `COPY` statements, in order.
    pub async fn loads(&self) -> Vec<String> {
        self.loads.read().await.clone()
    }

    /// Objects created by `CREATE ... IF NOT EXISTS`, sorted.
    pub async fn created_objects(&self) -> Vec<String> {
        self.created.read().await.iter().cloned().collect()
    }

    async fn check_failure(&self, statement: &str) -> Result<()> {
        if *self.fail_all.read().await {
            return Err(WarehouseError::Statement {
                statement: statement.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        if statement.starts_with("COPY ") {
            if let Some(pattern) = self.fail_copy_matching.read().await.as_deref() {
                if statement.contains(pattern) {
                    return Err(WarehouseError::Statement {
                        statement: statement.to_string(),
                        reason: "injected load failure".to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Warehouse for MockWarehouse {
    async fn execute(&self, statements: &[String]) -> Result<()> {
        for statement in statements {
            self.check_failure(statement).await?;

            if let Some((kind, rest)) = statement.split_once(IF_NOT_EXISTS) {
                let name = rest.split_whitespace().next().unwrap_or_default();
                self.created
                    .write()
                    .await
                    .insert(format!("{} {}", kind, name));
            }
            if statement.starts_with("COPY ") {
                self.loads.write().await.push(statement.clone());
            }
            self.statements.write().await.push(statement.clone());
        }
        Ok(())
    }

    /// Returns the number of successful loads, standing in for a row count.
    async fn query_scalar_i64(&self, sql: &str) -> Result<i64> {
        self.check_failure(sql).await?;
        Ok(self.loads.read().await.len() as i64)
    }

    fn backend(&self) -> &'static str {
        "mock"
    }
}
