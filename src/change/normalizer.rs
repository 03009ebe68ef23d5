//! Stream batch to canonical records.

use tracing::{debug, info};

use super::value::item_to_canonical;
use super::{CanonicalRecord, ChangeRecord, Operation, Result, StreamEvent, StreamRecord};

/// Converts stream batches into ordered canonical records.
///
/// INSERT and MODIFY events yield their new image. REMOVE events are
/// acknowledged and dropped; the warehouse table is an append-only mirror
/// with no deletion rows. Any other operation fails the whole batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeNormalizer;

impl ChangeNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize a full stream batch.
    pub fn normalize(&self, event: &StreamEvent) -> Result<Vec<CanonicalRecord>> {
        info!(
            records = event.records.len(),
            "Received records from DynamoDB stream"
        );
        self.normalize_records(&event.records)
    }

    /// Normalize raw records, preserving their order.
    pub fn normalize_records(&self, records: &[StreamRecord]) -> Result<Vec<CanonicalRecord>> {
        let mut output = Vec::with_capacity(records.len());
        let mut removed = 0usize;

        for (index, raw) in records.iter().enumerate() {
            let change = ChangeRecord::from_stream(index, raw)?;
            match change.operation {
                Operation::Insert | Operation::Modify => {
                    // from_stream guarantees an image for these operations
                    if let Some(image) = &change.new_image {
                        output.push(item_to_canonical("", image)?);
                    }
                }
                Operation::Remove => {
                    removed += 1;
                    debug!(index, "Skipping REMOVE event");
                }
            }
        }

        debug!(
            kept = output.len(),
            removed,
            "Normalized stream batch"
        );
        Ok(output)
    }
}
