//! Staging pipeline step definitions.

use std::sync::Arc;
use std::time::Duration;

use cdcflow::change::{AttributeValue, ChangeNormalizer, StreamEvent, StreamImage, StreamRecord};
use cdcflow::mover::{DrainFailure, DrainReport, IngestionMover};
use cdcflow::staging::{
    MockStagingStore, StagedBatch, StagedObjectKind, StagingLayout, StagingStore, StagingWriter,
};
use cdcflow::warehouse::{CopyOptions, MockWarehouse, TargetTable};
use cucumber::{gherkin::Step, given, then, when, World};

/// Test context for staging pipeline scenarios.
#[derive(World)]
#[world(init = Self::new)]
pub struct PipelineWorld {
    store: Arc<MockStagingStore>,
    warehouse: Arc<MockWarehouse>,
    layout: StagingLayout,
    batch: StreamEvent,
    last_write: Option<Result<StagedBatch, String>>,
    last_report: Option<DrainReport>,
}

impl std::fmt::Debug for PipelineWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineWorld")
            .field("batch_records", &self.batch.records.len())
            .field("last_write", &self.last_write)
            .field("last_report", &self.last_report)
            .finish()
    }
}

impl PipelineWorld {
    fn new() -> Self {
        Self {
            store: Arc::new(MockStagingStore::new()),
            warehouse: Arc::new(MockWarehouse::new()),
            layout: StagingLayout::new("unprocessed", "processed"),
            batch: StreamEvent::default(),
            last_write: None,
            last_report: None,
        }
    }

    fn writer(&self) -> StagingWriter {
        StagingWriter::new(
            self.store.clone(),
            self.layout.clone(),
            Duration::from_secs(5),
        )
    }

    fn mover(&self) -> IngestionMover {
        IngestionMover::new(
            self.store.clone(),
            self.warehouse.clone(),
            self.layout.clone(),
            TargetTable::new("dev", "dynamodb_cdc", "trades"),
            CopyOptions {
                region: "us-east-1".to_string(),
                iam_role_arn: "arn:aws:iam::123456789012:role/redshift".to_string(),
            },
        )
    }

    fn make_record(operation: &str, id: &str, price: &str) -> StreamRecord {
        let new_image = (operation != "REMOVE").then(|| {
            let mut image = std::collections::HashMap::new();
            image.insert("id".to_string(), AttributeValue::S(id.to_string()));
            if !price.is_empty() {
                image.insert("price".to_string(), AttributeValue::N(price.to_string()));
            }
            image
        });
        StreamRecord {
            event_id: None,
            event_name: operation.to_string(),
            dynamodb: StreamImage {
                new_image,
                sequence_number: None,
            },
        }
    }

    async fn pending_of_kind(&self, kind: Option<StagedObjectKind>) -> usize {
        self.store
            .list(&self.layout.pending_dir())
            .await
            .expect("list pending")
            .iter()
            .filter(|key| kind.is_none() || StagedObjectKind::classify(key) == kind)
            .count()
    }

    fn report(&self) -> &DrainReport {
        self.last_report.as_ref().expect("No drain has run")
    }
}

// ==========================================================================
// Background and setup
// ==========================================================================

#[given("an empty staging area")]
async fn given_empty_staging_area(world: &mut PipelineWorld) {
    assert!(world.store.is_empty().await);
}

#[given("a stream batch:")]
async fn given_stream_batch(world: &mut PipelineWorld, step: &Step) {
    let table = step.table.as_ref().expect("Batch table required");
    world.batch.records = table
        .rows
        .iter()
        .skip(1) // Skip header
        .map(|row| PipelineWorld::make_record(&row[0], &row[1], &row[2]))
        .collect();
}

#[given(expr = "a staged batch of {int} records")]
async fn given_staged_batch(world: &mut PipelineWorld, count: usize) {
    world.batch.records = (0..count)
        .map(|i| PipelineWorld::make_record("INSERT", &i.to_string(), "1.5"))
        .collect();
    let records = ChangeNormalizer::new().normalize(&world.batch).unwrap();
    world.writer().write_now(&records).await.unwrap();
}

#[given(expr = "a stray object {string}")]
async fn given_stray_object(world: &mut PipelineWorld, key: String) {
    world.store.put(&key, b"not staged".to_vec()).await.unwrap();
}

#[given("the warehouse rejects loads")]
async fn given_warehouse_rejects_loads(world: &mut PipelineWorld) {
    world.warehouse.set_fail_copy_matching(Some("unprocessed/")).await;
}

#[given("moves to processed fail")]
async fn given_moves_fail(world: &mut PipelineWorld) {
    world.store.set_fail_on_copy(true).await;
}

#[when("moves to processed succeed again")]
async fn when_moves_succeed(world: &mut PipelineWorld) {
    world.store.set_fail_on_copy(false).await;
}

// ==========================================================================
// Actions
// ==========================================================================

#[when("the stream writer handles the batch")]
async fn when_stream_writer_handles(world: &mut PipelineWorld) {
    let result = match ChangeNormalizer::new().normalize(&world.batch) {
        Ok(records) => world
            .writer()
            .write_now(&records)
            .await
            .map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    world.last_write = Some(result);
}

#[when("the loader drains the staging area")]
async fn when_loader_drains(world: &mut PipelineWorld) {
    let report = world.mover().drain().await.expect("Drain failed to list");
    world.last_report = Some(report);
}

// ==========================================================================
// Staging assertions
// ==========================================================================

#[then(expr = "{int} data object(s) is/are pending")]
async fn then_data_objects_pending(world: &mut PipelineWorld, count: usize) {
    let actual = world
        .pending_of_kind(Some(StagedObjectKind::Data))
        .await;
    assert_eq!(actual, count, "Expected {} data objects, got {}", count, actual);
}

#[then(expr = "{int} empty marker(s) is/are pending")]
async fn then_markers_pending(world: &mut PipelineWorld, count: usize) {
    let actual = world
        .pending_of_kind(Some(StagedObjectKind::EmptyMarker))
        .await;
    assert_eq!(actual, count, "Expected {} markers, got {}", count, actual);
}

#[then(expr = "{int} object(s) is/are pending")]
async fn then_objects_pending(world: &mut PipelineWorld, count: usize) {
    let actual = world.pending_of_kind(None).await;
    assert_eq!(actual, count, "Expected {} pending, got {}", count, actual);
}

#[then(expr = "{int} object(s) is/are processed")]
async fn then_objects_processed(world: &mut PipelineWorld, count: usize) {
    let actual = world
        .store
        .list(&world.layout.processed_dir())
        .await
        .unwrap()
        .len();
    assert_eq!(actual, count, "Expected {} processed, got {}", count, actual);
}

#[then(expr = "the staged object holds {int} records")]
async fn then_staged_object_holds(world: &mut PipelineWorld, count: usize) {
    let batch = match world.last_write.as_ref().expect("Nothing written") {
        Ok(batch) => batch,
        Err(e) => panic!("Stream writer failed: {}", e),
    };
    let body = world.store.get(&batch.key).await.unwrap();
    let lines = String::from_utf8(body).unwrap().lines().count();
    assert_eq!(batch.record_count, count);
    assert_eq!(lines, count);
}

#[then(expr = "the stream writer fails naming {string}")]
async fn then_stream_writer_fails(world: &mut PipelineWorld, name: String) {
    match world.last_write.as_ref().expect("Nothing written") {
        Ok(batch) => panic!("Expected failure, staged {}", batch.key),
        Err(e) => assert!(e.contains(&name), "Error {:?} does not name {}", e, name),
    }
}

#[then(expr = "the object {string} is still pending")]
async fn then_object_still_pending(world: &mut PipelineWorld, key: String) {
    assert!(world.store.contains(&key).await);
}

// ==========================================================================
// Drain assertions
// ==========================================================================

#[then(expr = "{int} load(s) is/are issued")]
async fn then_loads_issued(world: &mut PipelineWorld, count: usize) {
    let actual = world.warehouse.loads().await.len();
    assert_eq!(actual, count, "Expected {} loads, got {}", count, actual);
}

#[then("the drain reports no failures")]
async fn then_no_failures(world: &mut PipelineWorld) {
    assert!(
        world.report().is_clean(),
        "Unexpected failures: {:?}",
        world.report().failures
    );
}

#[then("the drain reports a load failure")]
async fn then_load_failure(world: &mut PipelineWorld) {
    assert!(world
        .report()
        .failures
        .iter()
        .any(|failure| matches!(failure, DrainFailure::Load { .. })));
}

#[then("the drain reports a move failure after loading")]
async fn then_move_failure_after_load(world: &mut PipelineWorld) {
    assert!(world
        .report()
        .failures
        .iter()
        .any(|failure| matches!(failure, DrainFailure::Move { loaded: true, .. })));
}

#[then(expr = "the drain reports an unrecognized object {string}")]
async fn then_unrecognized_object(world: &mut PipelineWorld, key: String) {
    assert!(world.report().failures.iter().any(|failure| {
        matches!(failure, DrainFailure::UnrecognizedKey { .. }) && failure.key() == key
    }));
}
