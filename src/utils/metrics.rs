//! OTel-native metrics instruments.
//!
//! Centralized metric definitions using OpenTelemetry meters.
//! All instruments are lazily initialized and feature-gated behind `otel`.
//!
//! Naming follows OTel semantic conventions (dot-separated).

use std::sync::LazyLock;

use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use opentelemetry::{global, KeyValue};

static METER: LazyLock<Meter> = LazyLock::new(|| global::meter("cdcflow"));

// ============================================================================
// Staging Area
// ============================================================================

/// Objects waiting in the pending partition at the start of a drain.
///
/// Sustained growth means the loader is not keeping up or keeps failing.
pub static STAGING_PENDING: LazyLock<Gauge<u64>> = LazyLock::new(|| {
    METER
        .u64_gauge("cdcflow.staging.pending")
        .with_description("Objects in the pending staging partition")
        .build()
});

/// Records written to staged objects.
pub static STAGED_RECORDS_TOTAL: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("cdcflow.staging.records")
        .with_description("Records written to the staging area")
        .build()
});

// ============================================================================
// Loader
// ============================================================================

/// Bulk loads attempted.
pub static LOAD_TOTAL: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("cdcflow.load.total")
        .with_description("Total warehouse bulk loads")
        .build()
});

/// Duration of bulk loads.
pub static LOAD_DURATION: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("cdcflow.load.duration")
        .with_description("Warehouse bulk load duration")
        .with_unit("s")
        .build()
});

/// Pending to processed moves attempted.
pub static MOVE_TOTAL: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("cdcflow.move.total")
        .with_description("Total staged object moves")
        .build()
});

// ============================================================================
// Helper
// ============================================================================

/// Create an outcome label.
pub fn outcome_attr(outcome: &str) -> KeyValue {
    KeyValue::new("outcome", outcome.to_string())
}

/// Create a staged object kind label.
pub fn kind_attr(kind: &str) -> KeyValue {
    KeyValue::new("kind", kind.to_string())
}
