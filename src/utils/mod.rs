//! Pure utility functions.
//!
//! Shared initialization and helpers used by all cdcflow binaries.

pub mod bootstrap;
pub mod deadline;
#[cfg(feature = "otel")]
pub mod metrics;
