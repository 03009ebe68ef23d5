//! cdcflow-stream-writer: DynamoDB stream batch to staging area
//!
//! Invoked by the DynamoDB stream event source mapping. Every invocation
//! writes exactly one staged object: a JSON-lines data file for the
//! INSERT/MODIFY images, or an empty marker when the batch had none.
//!
//! ## Architecture
//! ```text
//! [DynamoDB stream] --(batch)--> [cdcflow-stream-writer] --put--> {pending}/...
//! ```
//!
//! ## Configuration
//! - CDCFLOW_CONFIG: YAML config file (optional)
//! - CDCFLOW__STAGING__*: staging section overrides
//! - CDCFLOW_LOG: log filter (default: info)
//!
//! A returned error makes the event source retry the whole batch.

use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use tracing::info;

use cdcflow::change::{ChangeNormalizer, StreamEvent};
use cdcflow::config::Config;
use cdcflow::staging::{init_staging_store, StagingWriter};
use cdcflow::utils::bootstrap::{init_tracing, InvocationMetrics};

struct StreamWriter {
    normalizer: ChangeNormalizer,
    writer: StagingWriter,
    metrics: InvocationMetrics,
}

async fn handle(state: &StreamWriter, event: LambdaEvent<StreamEvent>) -> Result<(), Error> {
    let (event, context) = event.into_parts();
    info!(
        request_id = %context.request_id,
        records = event.records.len(),
        "Received stream batch"
    );

    let outcome = async {
        let records = state.normalizer.normalize(&event)?;
        let batch = state.writer.write_now(&records).await?;
        Ok::<_, Error>(batch)
    }
    .await;
    state.metrics.flush();

    let batch = outcome?;
    info!(
        request_id = %context.request_id,
        key = %batch.key,
        records = batch.record_count,
        "Stream batch staged"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let config = Config::load(None)?;
    let store = init_staging_store(&config.staging).await?;
    let state = StreamWriter {
        normalizer: ChangeNormalizer::new(),
        writer: StagingWriter::new(store, config.staging.layout(), config.staging.timeout()),
        metrics: InvocationMetrics::init(),
    };

    info!(
        pending = %config.staging.layout().pending_dir(),
        "cdcflow-stream-writer started"
    );

    let state = &state;
    run(service_fn(move |event| async move { handle(state, event).await })).await
}
