//! Fixed destination schema and its bootstrapper.
//!
//! The column set is a fixed projection. It is not derived from the staged
//! records: `COPY ... JSON 'auto'` drops attributes without a column and
//! loads missing attributes as null.

use std::sync::Arc;

use sea_query::{Alias, ColumnDef, Iden, PostgresQueryBuilder, Table};
use tracing::info;

use super::{quote_ident, Result, TargetTable, Warehouse};

/// CDC table columns.
#[derive(Iden)]
pub enum CdcColumns {
    #[iden = "id"]
    Id,
    #[iden = "details"]
    Details,
    #[iden = "price"]
    Price,
    #[iden = "shares"]
    Shares,
    #[iden = "ticker"]
    Ticker,
    #[iden = "ticket"]
    Ticket,
    #[iden = "time"]
    Time,
}

/// `CREATE SCHEMA IF NOT EXISTS "<schema>"`
pub fn create_schema_sql(schema: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(schema))
}

/// `CREATE TABLE IF NOT EXISTS "<schema>"."<table>"` with the fixed columns.
pub fn create_table_sql(target: &TargetTable) -> String {
    // Redshift's semi-structured type
    let semi_structured = || Alias::new("super");

    Table::create()
        .table((Alias::new(&target.schema), Alias::new(&target.table)))
        .if_not_exists()
        .col(
            ColumnDef::new(CdcColumns::Id)
                .string_len(30)
                .not_null()
                .unique_key(),
        )
        .col(ColumnDef::new(CdcColumns::Details).custom(semi_structured()))
        .col(ColumnDef::new(CdcColumns::Price).double())
        .col(ColumnDef::new(CdcColumns::Shares).integer())
        .col(ColumnDef::new(CdcColumns::Ticker).string_len(10))
        .col(ColumnDef::new(CdcColumns::Ticket).string_len(10))
        .col(ColumnDef::new(CdcColumns::Time).custom(semi_structured()))
        .to_string(PostgresQueryBuilder)
}

/// Ensures the destination namespace and table exist.
///
/// Safe to re-run: every statement is create-if-absent. Ordering against the
/// first load is the deployment's job, not this type's.
pub struct SchemaBootstrapper {
    warehouse: Arc<dyn Warehouse>,
    target: TargetTable,
}

impl SchemaBootstrapper {
    pub fn new(warehouse: Arc<dyn Warehouse>, target: TargetTable) -> Self {
        Self { warehouse, target }
    }

    /// DDL in execution order: namespace, then table.
    pub fn statements(&self) -> Vec<String> {
        vec![
            create_schema_sql(&self.target.schema),
            create_table_sql(&self.target),
        ]
    }

    /// Execute the DDL. Any failure is returned and nothing after it runs.
    pub async fn run(&self) -> Result<()> {
        let statements = self.statements();
        self.warehouse.execute(&statements).await?;
        info!(
            target_table = %self.target,
            statements = statements.len(),
            backend = self.warehouse.backend(),
            "Warehouse schema bootstrapped"
        );
        Ok(())
    }
}
