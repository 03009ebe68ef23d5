//! Redshift warehouse over the postgres wire protocol.
//!
//! Redshift does not keep server-side prepared statements for DDL or `COPY`,
//! so statements go through `raw_sql` (simple query protocol). Each call to
//! [`Warehouse::execute`] opens its own connection and closes it before
//! returning.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use sqlx::{Connection, Executor, PgConnection};
use tracing::{debug, warn};

use super::{Result, Warehouse, WarehouseConfig, WarehouseError};
use crate::utils::deadline::with_deadline;

/// Redshift cluster reached with sqlx's postgres driver.
pub struct RedshiftWarehouse {
    options: PgConnectOptions,
    endpoint: String,
    connect_timeout: Duration,
    statement_timeout: Duration,
}

impl RedshiftWarehouse {
    /// Create from configuration. Statements get the configured statement
    /// deadline; loaders raise it with [`Self::with_statement_timeout`].
    pub fn new(config: &WarehouseConfig) -> Self {
        let options = PgConnectOptions::new()
            .host(config.host_name())
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database)
            .ssl_mode(PgSslMode::Prefer);

        Self {
            options,
            endpoint: format!("{}:{}", config.host_name(), config.port),
            connect_timeout: config.connect_timeout(),
            statement_timeout: config.statement_timeout(),
        }
    }

    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    async fn connect(&self) -> Result<PgConnection> {
        let connect = async {
            PgConnection::connect_with(&self.options)
                .await
                .map_err(|e| WarehouseError::Connect {
                    endpoint: self.endpoint.clone(),
                    reason: e.to_string(),
                })
        };
        with_deadline(self.connect_timeout, connect, || WarehouseError::Timeout {
            operation: "connect",
            after: self.connect_timeout,
        })
        .await
    }

    async fn close(&self, conn: PgConnection) {
        match tokio::time::timeout(self.connect_timeout, conn.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(endpoint = %self.endpoint, error = %e, "Failed to close warehouse connection"),
            Err(_) => warn!(endpoint = %self.endpoint, "Timed out closing warehouse connection"),
        }
    }

    async fn run_statements(&self, conn: &mut PgConnection, statements: &[String]) -> Result<()> {
        for statement in statements {
            let run = async {
                conn.execute(sqlx::raw_sql(statement))
                    .await
                    .map_err(|e| WarehouseError::Statement {
                        statement: statement.clone(),
                        reason: e.to_string(),
                    })
            };
            let done = with_deadline(self.statement_timeout, run, || WarehouseError::Timeout {
                operation: "statement",
                after: self.statement_timeout,
            })
            .await?;
            debug!(
                statement = %statement,
                rows_affected = done.rows_affected(),
                "Executed warehouse statement"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl Warehouse for RedshiftWarehouse {
    async fn execute(&self, statements: &[String]) -> Result<()> {
        let mut conn = self.connect().await?;
        let outcome = self.run_statements(&mut conn, statements).await;
        self.close(conn).await;
        outcome
    }

    async fn query_scalar_i64(&self, sql: &str) -> Result<i64> {
        let mut conn = self.connect().await?;
        let query = async {
            sqlx::query_scalar::<_, i64>(sql)
                .fetch_optional(&mut conn)
                .await
                .map_err(|e| WarehouseError::Statement {
                    statement: sql.to_string(),
                    reason: e.to_string(),
                })
        };
        let outcome = with_deadline(self.statement_timeout, query, || WarehouseError::Timeout {
            operation: "query",
            after: self.statement_timeout,
        })
        .await;
        self.close(conn).await;
        outcome?.ok_or_else(|| WarehouseError::NoValue(sql.to_string()))
    }

    fn backend(&self) -> &'static str {
        "redshift"
    }
}
