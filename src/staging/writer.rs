//! Writes one staged object per stream batch.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use super::key::{staged_file_name, StagedObjectKind, StagingLayout};
use super::{Result, StagingError, StagingStore};
use crate::change::{record_to_json, CanonicalRecord};
use crate::utils::deadline::with_deadline;

/// Summary of an object written by [`StagingWriter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedBatch {
    pub key: String,
    pub kind: StagedObjectKind,
    pub record_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Encode records as newline-separated JSON objects.
///
/// No trailing newline. An empty slice encodes to an empty body.
pub fn encode_records(records: &[CanonicalRecord]) -> Result<Vec<u8>> {
    let mut lines = Vec::with_capacity(records.len());
    for record in records {
        lines.push(record_to_json(record)?.to_string());
    }
    Ok(lines.join("\n").into_bytes())
}

/// Serializes normalized batches into the pending partition.
pub struct StagingWriter {
    store: Arc<dyn StagingStore>,
    layout: StagingLayout,
    timeout: Duration,
}

impl StagingWriter {
    pub fn new(store: Arc<dyn StagingStore>, layout: StagingLayout, timeout: Duration) -> Self {
        Self {
            store,
            layout,
            timeout,
        }
    }

    /// Write `records` as exactly one staged object.
    ///
    /// Non-empty batches become a data file; empty batches become a
    /// zero-byte marker so the loader still sees that the batch happened.
    pub async fn write(
        &self,
        records: &[CanonicalRecord],
        created_at: DateTime<Utc>,
        discriminator: Uuid,
    ) -> Result<StagedBatch> {
        let key = self
            .layout
            .pending_key(&staged_file_name(created_at, discriminator, records.len()));
        let kind = if records.is_empty() {
            StagedObjectKind::EmptyMarker
        } else {
            StagedObjectKind::Data
        };
        let body = encode_records(records)?;
        let size = body.len();

        with_deadline(self.timeout, self.store.put(&key, body), || {
            StagingError::Timeout {
                operation: "put",
                key: key.clone(),
                after: self.timeout,
            }
        })
        .await?;

        #[cfg(feature = "otel")]
        {
            use crate::utils::metrics::{kind_attr, STAGED_RECORDS_TOTAL};
            STAGED_RECORDS_TOTAL.add(records.len() as u64, &[kind_attr(kind.as_str())]);
        }

        info!(
            key = %key,
            records = records.len(),
            bytes = size,
            kind = kind.as_str(),
            "Wrote staged object"
        );

        Ok(StagedBatch {
            key,
            kind,
            record_count: records.len(),
            created_at,
        })
    }

    /// Write with the current time and a fresh random discriminator.
    pub async fn write_now(&self, records: &[CanonicalRecord]) -> Result<StagedBatch> {
        self.write(records, Utc::now(), Uuid::new_v4()).await
    }
}
