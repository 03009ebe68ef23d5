//! Outcome of one drain.

use thiserror::Error;

use crate::lease::LeaseError;
use crate::staging::StagingError;
use crate::warehouse::WarehouseError;

/// Why one pending object was not fully processed.
#[derive(Debug, Error)]
pub enum DrainFailure {
    #[error("{key}: unrecognized staged object ({reason})")]
    UnrecognizedKey { key: String, reason: String },

    #[error("{key}: load failed: {source}")]
    Load {
        key: String,
        #[source]
        source: WarehouseError,
    },

    /// `loaded` is true when the rows already landed; a later drain will
    /// load them again.
    #[error("{key}: move to processed failed (loaded: {loaded}): {source}")]
    Move {
        key: String,
        loaded: bool,
        #[source]
        source: StagingError,
    },

    #[error("{key}: existence check failed: {source}")]
    Exists {
        key: String,
        #[source]
        source: StagingError,
    },

    #[error("{key}: lease failed: {source}")]
    Lease {
        key: String,
        #[source]
        source: LeaseError,
    },
}

impl DrainFailure {
    /// Object the failure belongs to.
    pub fn key(&self) -> &str {
        match self {
            DrainFailure::UnrecognizedKey { key, .. }
            | DrainFailure::Load { key, .. }
            | DrainFailure::Move { key, .. }
            | DrainFailure::Exists { key, .. }
            | DrainFailure::Lease { key, .. } => key,
        }
    }

    /// False only for a move that failed after the rows were loaded.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, DrainFailure::Move { loaded: true, .. })
    }
}

/// Errors surfaced by the loader.
#[derive(Debug, Error)]
pub enum MoverError {
    #[error("Failed to list pending objects: {0}")]
    List(#[source] StagingError),

    #[error(
        "{} of {pending} pending objects failed: {}",
        .failures.len(),
        summarize(.failures)
    )]
    Incomplete {
        pending: usize,
        failures: Vec<DrainFailure>,
    },
}

fn summarize(failures: &[DrainFailure]) -> String {
    failures
        .iter()
        .map(|failure| failure.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Counters and failures for one drain.
#[derive(Debug, Default)]
pub struct DrainReport {
    /// Objects listed under the pending prefix.
    pub pending: usize,
    /// Data objects loaded into the warehouse.
    pub loaded: usize,
    /// Objects moved to the processed prefix.
    pub moved: usize,
    /// Objects skipped because another invocation holds their lease or
    /// already moved them.
    pub skipped_leased: usize,
    pub failures: Vec<DrainFailure>,
}

impl DrainReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Ok unless a failure is fatal, then every failure as one error.
    ///
    /// Loaded-but-unmoved objects stay in `failures` for the caller to log.
    pub fn into_result(self) -> Result<Self, MoverError> {
        if !self.failures.iter().any(DrainFailure::is_fatal) {
            Ok(self)
        } else {
            Err(MoverError::Incomplete {
                pending: self.pending,
                failures: self.failures,
            })
        }
    }
}
