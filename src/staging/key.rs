//! Staged object naming and classification.
//!
//! File names are part of the external contract and must stay bit-exact:
//! ```text
//! 2024-01-31T12:00:00Z__<uuid>__<count>__inserted_or_modified_records.json
//! 2024-01-31T12:00:00Z__<uuid>__no_inserted_or_modified_records.txt
//! ```

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{Result, StagingError};

/// Suffix of staged files holding records.
pub const DATA_SUFFIX: &str = "__inserted_or_modified_records.json";

/// Suffix of staged markers for batches with nothing to load.
pub const EMPTY_MARKER_SUFFIX: &str = "__no_inserted_or_modified_records.txt";

/// UTC timestamp format, seconds precision.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// What a staged object contains, decided by its key suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagedObjectKind {
    /// Newline-delimited JSON records to bulk load.
    Data,
    /// A batch that was observed but had nothing to load.
    EmptyMarker,
}

impl StagedObjectKind {
    /// Classify a key by suffix. `None` means the key was not written by the
    /// stream writer.
    pub fn classify(key: &str) -> Option<Self> {
        if key.ends_with(DATA_SUFFIX) {
            Some(StagedObjectKind::Data)
        } else if key.ends_with(EMPTY_MARKER_SUFFIX) {
            Some(StagedObjectKind::EmptyMarker)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StagedObjectKind::Data => "data",
            StagedObjectKind::EmptyMarker => "empty_marker",
        }
    }
}

/// File name for a batch of `record_count` records.
pub fn staged_file_name(created_at: DateTime<Utc>, discriminator: Uuid, record_count: usize) -> String {
    let timestamp = created_at.format(TIMESTAMP_FORMAT);
    if record_count > 0 {
        format!(
            "{}__{}__{}{}",
            timestamp, discriminator, record_count, DATA_SUFFIX
        )
    } else {
        format!("{}__{}{}", timestamp, discriminator, EMPTY_MARKER_SUFFIX)
    }
}

/// The pending and processed partitions of the staging namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingLayout {
    pending: String,
    processed: String,
}

impl StagingLayout {
    /// Build a layout from two prefix names. Trailing slashes are ignored.
    pub fn new(pending: impl AsRef<str>, processed: impl AsRef<str>) -> Self {
        Self {
            pending: pending.as_ref().trim_end_matches('/').to_string(),
            processed: processed.as_ref().trim_end_matches('/').to_string(),
        }
    }

    /// Listing prefix of the pending partition, with trailing slash.
    pub fn pending_dir(&self) -> String {
        format!("{}/", self.pending)
    }

    /// Listing prefix of the processed partition, with trailing slash.
    pub fn processed_dir(&self) -> String {
        format!("{}/", self.processed)
    }

    /// Pending key for a file name.
    pub fn pending_key(&self, file_name: &str) -> String {
        format!("{}/{}", self.pending, file_name)
    }

    /// Processed key for a pending key, keeping the file name.
    pub fn processed_key_for(&self, pending_key: &str) -> Result<String> {
        let file_name = pending_key
            .strip_prefix(&self.pending_dir())
            .filter(|name| !name.is_empty() && !name.contains('/'))
            .ok_or_else(|| StagingError::OutsidePartition {
                key: pending_key.to_string(),
                prefix: self.pending_dir(),
            })?;
        Ok(format!("{}/{}", self.processed, file_name))
    }
}
