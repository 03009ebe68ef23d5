//! Destination warehouse.
//!
//! The warehouse is only ever driven with fixed statements: idempotent DDL
//! from the [`SchemaBootstrapper`] and one `COPY` per staged data object from
//! the loader. Connections are scoped to a single [`Warehouse::execute`] call.
//!
//! ## Backends
//!
//! - `RedshiftWarehouse` (feature: redshift) - Redshift over the postgres wire protocol
//! - `MockWarehouse` - Records statements, with failure injection

mod config;
mod copy;
pub mod mock;
#[cfg(feature = "redshift")]
mod redshift;
mod schema;

pub use config::WarehouseConfig;
pub use copy::{copy_statement, CopyOptions};
pub use mock::MockWarehouse;
#[cfg(feature = "redshift")]
pub use redshift::RedshiftWarehouse;
pub use schema::{create_schema_sql, create_table_sql, CdcColumns, SchemaBootstrapper};

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur talking to the warehouse.
#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("Failed to connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("Statement failed ({statement}): {reason}")]
    Statement { statement: String, reason: String },

    #[error("Query returned no value: {0}")]
    NoValue(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

/// Result type for warehouse operations.
pub type Result<T> = std::result::Result<T, WarehouseError>;

/// A SQL session provider.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Run `statements` in order on one session.
    ///
    /// Stops at and returns the first failure. The session is released
    /// whatever the outcome.
    async fn execute(&self, statements: &[String]) -> Result<()>;

    /// Run a query returning a single integer (row counts and similar).
    async fn query_scalar_i64(&self, sql: &str) -> Result<i64>;

    /// Backend name for logs.
    fn backend(&self) -> &'static str;
}

/// Quote an SQL identifier, doubling embedded double quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote an SQL string literal, doubling embedded single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Fully qualified destination table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetTable {
    pub database: String,
    pub schema: String,
    pub table: String,
}

impl TargetTable {
    pub fn new(
        database: impl Into<String>,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// `"database"."schema"."table"`
    pub fn qualified(&self) -> String {
        format!(
            "{}.{}.{}",
            quote_ident(&self.database),
            quote_ident(&self.schema),
            quote_ident(&self.table)
        )
    }

    /// Row count query used for post-load diagnostics.
    pub fn count_sql(&self) -> String {
        format!("SELECT COUNT(*) FROM {}", self.qualified())
    }
}

impl fmt::Display for TargetTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.database, self.schema, self.table)
    }
}
