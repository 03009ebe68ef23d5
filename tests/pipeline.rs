//! End-to-end pipeline tests: stream batch -> staging -> warehouse.
//!
//! Uses the filesystem staging store and the mock warehouse, so no cloud
//! resources are needed.
//!
//! ```bash
//! cargo test --test pipeline
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use tempfile::TempDir;
use uuid::Uuid;

use cdcflow::change::{ChangeNormalizer, StreamEvent};
use cdcflow::lease::InMemoryLeaseStore;
use cdcflow::mover::{DrainFailure, IngestionMover};
use cdcflow::staging::{
    FilesystemStagingStore, StagedObjectKind, StagingLayout, StagingStore, StagingWriter,
};
use cdcflow::warehouse::{CopyOptions, MockWarehouse, SchemaBootstrapper, TargetTable};

struct Pipeline {
    _temp: TempDir,
    store: Arc<FilesystemStagingStore>,
    warehouse: Arc<MockWarehouse>,
    layout: StagingLayout,
}

impl Pipeline {
    async fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(FilesystemStagingStore::new(temp.path()).await.unwrap());
        Self {
            _temp: temp,
            store,
            warehouse: Arc::new(MockWarehouse::new()),
            layout: StagingLayout::new("unprocessed", "processed"),
        }
    }

    fn writer(&self) -> StagingWriter {
        StagingWriter::new(self.store.clone(), self.layout.clone(), Duration::from_secs(5))
    }

    fn target() -> TargetTable {
        TargetTable::new("dev", "dynamodb_cdc", "trades")
    }

    fn mover(&self) -> IngestionMover {
        IngestionMover::new(
            self.store.clone(),
            self.warehouse.clone(),
            self.layout.clone(),
            Self::target(),
            CopyOptions {
                region: "us-east-1".to_string(),
                iam_role_arn: "arn:aws:iam::123456789012:role/redshift".to_string(),
            },
        )
    }

    async fn pending(&self) -> Vec<String> {
        self.store.list(&self.layout.pending_dir()).await.unwrap()
    }

    async fn processed(&self) -> Vec<String> {
        self.store.list(&self.layout.processed_dir()).await.unwrap()
    }

    /// Normalize and stage one stream batch.
    async fn capture(&self, event: Value) -> cdcflow::staging::StagedBatch {
        let event: StreamEvent = serde_json::from_value(event).unwrap();
        let records = ChangeNormalizer::new().normalize(&event).unwrap();
        self.writer().write_now(&records).await.unwrap()
    }
}

fn three_event_batch() -> Value {
    json!({"Records": [
        {"eventName": "INSERT", "dynamodb": {"NewImage": {"id": {"S": "1"}, "price": {"N": "10.5"}}}},
        {"eventName": "MODIFY", "dynamodb": {"NewImage": {"id": {"S": "1"}, "price": {"N": "11.0"}}}},
        {"eventName": "REMOVE", "dynamodb": {}}
    ]})
}

fn lines(body: &[u8]) -> Vec<Value> {
    String::from_utf8(body.to_vec())
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_end_to_end_three_events() {
    let pipeline = Pipeline::new().await;

    let batch = pipeline.capture(three_event_batch()).await;

    assert_eq!(batch.kind, StagedObjectKind::Data);
    assert_eq!(batch.record_count, 2);
    assert!(batch.key.ends_with("__2__inserted_or_modified_records.json"));
    assert_eq!(pipeline.pending().await, vec![batch.key.clone()]);

    let body = pipeline.store.get(&batch.key).await.unwrap();
    assert_eq!(
        lines(&body),
        vec![json!({"id": "1", "price": 10.5}), json!({"id": "1", "price": 11.0})]
    );

    let report = pipeline.mover().drain().await.unwrap();

    assert!(report.is_clean());
    assert_eq!((report.loaded, report.moved), (1, 1));
    let loads = pipeline.warehouse.loads().await;
    assert_eq!(loads.len(), 1);
    assert!(loads[0].starts_with("COPY \"dev\".\"dynamodb_cdc\".\"trades\" FROM 'file://"));
    assert!(loads[0].ends_with("FORMAT AS JSON 'auto'"));

    let processed_key = pipeline.layout.processed_key_for(&batch.key).unwrap();
    assert!(pipeline.pending().await.is_empty());
    assert_eq!(pipeline.processed().await, vec![processed_key.clone()]);
    assert_eq!(pipeline.store.get(&processed_key).await.unwrap(), body);
}

#[tokio::test]
async fn test_decimal_round_trip_is_float_conversion() {
    let pipeline = Pipeline::new().await;

    let batch = pipeline
        .capture(json!({"Records": [
            {"eventName": "INSERT", "dynamodb": {"NewImage": {
                "id": {"S": "7"},
                "price": {"N": "123.456"},
                "shares": {"N": "300"},
                "details": {"M": {"amount": {"N": "0.1"}, "tags": {"SS": ["b", "a"]}}},
                "time": {"L": [{"N": "1700000000"}, {"S": "UTC"}]}
            }}}
        ]}))
        .await;

    let body = pipeline.store.get(&batch.key).await.unwrap();
    assert_eq!(
        lines(&body),
        vec![json!({
            "id": "7",
            "price": 123.456,
            "shares": 300.0,
            "details": {"amount": 0.1, "tags": ["b", "a"]},
            "time": [1700000000.0, "UTC"]
        })]
    );
}

#[tokio::test]
async fn test_all_remove_batch_round_trips_as_marker() {
    let pipeline = Pipeline::new().await;

    let batch = pipeline
        .capture(json!({"Records": [
            {"eventName": "REMOVE", "dynamodb": {}},
            {"eventName": "REMOVE", "dynamodb": {}}
        ]}))
        .await;

    assert_eq!(batch.kind, StagedObjectKind::EmptyMarker);
    assert!(batch
        .key
        .ends_with("__no_inserted_or_modified_records.txt"));
    assert_eq!(pipeline.pending().await.len(), 1);

    let report = pipeline.mover().drain().await.unwrap();

    assert!(report.is_clean());
    assert_eq!((report.loaded, report.moved), (0, 1));
    assert!(pipeline.warehouse.statements().await.is_empty());
    assert_eq!(pipeline.processed().await.len(), 1);
}

#[tokio::test]
async fn test_empty_stream_batch_writes_marker() {
    let pipeline = Pipeline::new().await;

    let batch = pipeline.capture(json!({"Records": []})).await;

    assert_eq!(batch.kind, StagedObjectKind::EmptyMarker);
    assert!(pipeline.store.get(&batch.key).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_classification_completeness() {
    let pipeline = Pipeline::new().await;
    let writer = pipeline.writer();
    let created_at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();

    let data = pipeline.capture(three_event_batch()).await;
    let marker = writer.write(&[], created_at, Uuid::new_v4()).await.unwrap();
    for stray in ["unprocessed/manual_upload.json", "unprocessed/readme.txt"] {
        pipeline.store.put(stray, b"x".to_vec()).await.unwrap();
    }

    let report = pipeline.mover().drain().await.unwrap();

    assert_eq!(report.pending, 4);
    assert_eq!(report.moved, 2);
    let mut failed: Vec<&str> = report
        .failures
        .iter()
        .map(|failure| {
            assert!(matches!(failure, DrainFailure::UnrecognizedKey { .. }));
            failure.key()
        })
        .collect();
    failed.sort();
    assert_eq!(
        failed,
        vec!["unprocessed/manual_upload.json", "unprocessed/readme.txt"]
    );

    let processed = pipeline.processed().await;
    assert!(processed.contains(&pipeline.layout.processed_key_for(&data.key).unwrap()));
    assert!(processed.contains(&pipeline.layout.processed_key_for(&marker.key).unwrap()));

    let message = report.into_result().unwrap_err().to_string();
    assert!(message.contains("manual_upload.json"));
    assert!(message.contains("readme.txt"));
}

#[tokio::test]
async fn test_bootstrap_before_ingest_is_idempotent() {
    let pipeline = Pipeline::new().await;
    let bootstrapper = SchemaBootstrapper::new(pipeline.warehouse.clone(), Pipeline::target());

    for _ in 0..3 {
        bootstrapper.run().await.unwrap();
    }
    pipeline.capture(three_event_batch()).await;
    pipeline.mover().drain().await.unwrap().into_result().unwrap();

    assert_eq!(
        pipeline.warehouse.created_objects().await,
        vec![
            "CREATE SCHEMA \"dynamodb_cdc\"".to_string(),
            "CREATE TABLE \"dynamodb_cdc\".\"trades\"".to_string(),
        ]
    );
    assert_eq!(pipeline.warehouse.loads().await.len(), 1);
}

#[tokio::test]
async fn test_overlapping_drains_with_leases_load_each_object_once() {
    let pipeline = Pipeline::new().await;
    for _ in 0..4 {
        pipeline.capture(three_event_batch()).await;
    }
    pipeline.capture(json!({"Records": []})).await;

    let leases = Arc::new(InMemoryLeaseStore::new());
    let ttl = Duration::from_secs(60);
    let first = pipeline.mover().with_lease(leases.clone(), ttl);
    let second = pipeline.mover().with_lease(leases.clone(), ttl);

    let (a, b) = tokio::join!(first.drain(), second.drain());
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(a.is_clean() && b.is_clean());
    assert_eq!(a.loaded + b.loaded, 4);
    assert_eq!(a.moved + b.moved, 5);
    assert_eq!(pipeline.warehouse.loads().await.len(), 4);
    assert!(pipeline.pending().await.is_empty());
    assert_eq!(pipeline.processed().await.len(), 5);
}
