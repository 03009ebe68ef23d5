//! cdcflow-loader: staging area to warehouse
//!
//! Invoked on a fixed schedule. Each invocation drains the pending partition:
//! data files are bulk loaded with `COPY` and then moved to processed, empty
//! markers are moved directly. Optionally reaps old processed objects.
//!
//! ## Architecture
//! ```text
//! [scheduler] --> [cdcflow-loader] --list/move--> {pending}/ -> {processed}/
//!                        |
//!                        +--COPY--> [Redshift]
//! ```
//!
//! ## Configuration
//! - CDCFLOW_CONFIG: YAML config file (optional)
//! - CDCFLOW__STAGING__*, CDCFLOW__WAREHOUSE__*, CDCFLOW__LEASE__*: overrides
//! - CDCFLOW_LOG: log filter (default: info)
//!
//! The invocation fails if any pending object failed, except for objects
//! that loaded but could not be moved: those are logged, and the next
//! scheduled run loads and moves them again. The scheduler's retry policy and
//! the next run pick the other leftovers up.

use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use cdcflow::config::Config;
use cdcflow::lease::init_lease_store;
use cdcflow::mover::IngestionMover;
use cdcflow::staging::{init_staging_store, ProcessedReaper};
use cdcflow::utils::bootstrap::{init_tracing, InvocationMetrics};
use cdcflow::warehouse::RedshiftWarehouse;

struct Loader {
    mover: IngestionMover,
    reaper: Option<ProcessedReaper>,
    metrics: InvocationMetrics,
}

async fn handle(state: &Loader, event: LambdaEvent<Value>) -> Result<(), Error> {
    let request_id = event.context.request_id;

    let drained = state.mover.drain().await;
    if let Some(reaper) = &state.reaper {
        if let Err(e) = reaper.run_once().await {
            warn!(error = %e, "Processed reaper failed");
        }
    }
    state.metrics.flush();

    let report = drained?.into_result()?;
    if !report.is_clean() {
        warn!(
            request_id = %request_id,
            unmoved = report.failures.len(),
            "Loaded objects could not be moved to processed; they will load again"
        );
    }
    info!(
        request_id = %request_id,
        loaded = report.loaded,
        moved = report.moved,
        "Loader invocation complete"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let config = Config::load(None)?;
    config.validate_for_loader()?;

    let store = init_staging_store(&config.staging).await?;
    let warehouse = RedshiftWarehouse::new(&config.warehouse)
        .with_statement_timeout(config.warehouse.load_timeout());
    let layout = config.staging.layout();

    let mut mover = IngestionMover::new(
        store.clone(),
        Arc::new(warehouse),
        layout.clone(),
        config.warehouse.target(),
        config.warehouse.copy_options(),
    )
    .with_timeouts(config.staging.timeout(), config.warehouse.load_timeout())
    .with_row_count_report(config.warehouse.report_row_count);
    if let Some(leases) = init_lease_store(&config.lease).await? {
        mover = mover.with_lease(leases, config.lease.ttl());
    }

    let reaper = config
        .staging
        .retention()
        .map(|retention| ProcessedReaper::new(store, layout.processed_dir(), retention));

    let state = Loader {
        mover,
        reaper,
        metrics: InvocationMetrics::init(),
    };

    info!(
        target_table = %config.warehouse.target(),
        pending = %layout.pending_dir(),
        "cdcflow-loader started"
    );

    let state = &state;
    run(service_fn(move |event| async move { handle(state, event).await })).await
}
