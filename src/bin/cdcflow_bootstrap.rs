//! cdcflow-bootstrap: create the warehouse schema and CDC table
//!
//! Invoked once per deployment, before the loader's schedule is enabled.
//! Re-running it is harmless: every statement is create-if-absent.
//!
//! ## Configuration
//! - CDCFLOW_CONFIG: YAML config file (optional)
//! - CDCFLOW__WAREHOUSE__*: warehouse section overrides
//! - CDCFLOW_LOG: log filter (default: info)

use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use cdcflow::config::Config;
use cdcflow::utils::bootstrap::init_tracing;
use cdcflow::warehouse::{RedshiftWarehouse, SchemaBootstrapper};

async fn handle(bootstrapper: &SchemaBootstrapper, event: LambdaEvent<Value>) -> Result<(), Error> {
    info!(request_id = %event.context.request_id, "Bootstrapping warehouse schema");
    bootstrapper.run().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let config = Config::load(None)?;
    let bootstrapper = SchemaBootstrapper::new(
        Arc::new(RedshiftWarehouse::new(&config.warehouse)),
        config.warehouse.target(),
    );

    info!(
        target_table = %config.warehouse.target(),
        "cdcflow-bootstrap started"
    );

    let bootstrapper = &bootstrapper;
    run(service_fn(move |event| async move { handle(bootstrapper, event).await })).await
}
