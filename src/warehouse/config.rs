//! Warehouse connection and load configuration.

use std::time::Duration;

use serde::Deserialize;

use super::{CopyOptions, TargetTable};

/// Configuration for the destination warehouse.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    /// Cluster endpoint. A `host:port` endpoint address is accepted; the
    /// port suffix is ignored in favour of `port`.
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Schema holding the CDC table.
    pub schema: String,
    /// CDC table name.
    pub table: String,
    /// Region of the staging bucket, passed to `COPY`.
    pub region: String,
    /// Role the warehouse assumes to read staged objects.
    pub iam_role_arn: String,
    pub connect_timeout_secs: u64,
    /// Deadline for DDL and diagnostic statements.
    pub statement_timeout_secs: u64,
    /// Deadline for one `COPY`.
    pub load_timeout_secs: u64,
    /// Log the table row count after a drain that loaded anything.
    pub report_row_count: bool,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5439,
            user: "awsuser".to_string(),
            password: String::new(),
            database: "dev".to_string(),
            schema: "dynamodb_cdc".to_string(),
            table: "trades".to_string(),
            region: "us-east-1".to_string(),
            iam_role_arn: String::new(),
            connect_timeout_secs: 5,
            statement_timeout_secs: 10,
            load_timeout_secs: 20,
            report_row_count: false,
        }
    }
}

impl WarehouseConfig {
    /// Host name with any `:port` suffix removed.
    pub fn host_name(&self) -> &str {
        self.host.split(':').next().unwrap_or(&self.host)
    }

    pub fn target(&self) -> TargetTable {
        TargetTable::new(&self.database, &self.schema, &self.table)
    }

    pub fn copy_options(&self) -> CopyOptions {
        CopyOptions {
            region: self.region.clone(),
            iam_role_arn: self.iam_role_arn.clone(),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn statement_timeout(&self) -> Duration {
        Duration::from_secs(self.statement_timeout_secs)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }
}
