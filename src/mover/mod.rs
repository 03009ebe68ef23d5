//! Ingestion mover: drains the pending partition into the warehouse.
//!
//! Per pending object:
//! ```text
//! classify --DATA--------> [lease] -> COPY -> move to processed -> [release]
//!          --EMPTY_MARKER> [lease] ---------> move to processed -> [release]
//!          --other-------> failure
//! ```
//!
//! Objects are independent. A failure on one is recorded and the drain moves
//! on; the caller surfaces all of them at the end through
//! [`DrainReport::into_result`]. An object only leaves pending after its load
//! succeeded, so a move failure means the next drain loads it again. A move
//! that fails after a successful load is reported but does not fail the
//! drain: the rows landed, and retrying the invocation would load them again.

mod report;

pub use report::{DrainFailure, DrainReport, MoverError};

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::lease::{LeaseError, LeaseStore};
use crate::staging::{StagedObjectKind, StagingError, StagingLayout, StagingStore};
use crate::utils::deadline::with_deadline;
use crate::warehouse::{copy_statement, CopyOptions, TargetTable, Warehouse, WarehouseError};

const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(20);

/// Optional per-object leasing.
struct Leasing {
    store: Arc<dyn LeaseStore>,
    ttl: Duration,
}

/// Loads pending staged objects and moves them to processed.
pub struct IngestionMover {
    store: Arc<dyn StagingStore>,
    warehouse: Arc<dyn Warehouse>,
    layout: StagingLayout,
    target: TargetTable,
    copy_options: CopyOptions,
    leasing: Option<Leasing>,
    store_timeout: Duration,
    load_timeout: Duration,
    report_row_count: bool,
}

impl IngestionMover {
    pub fn new(
        store: Arc<dyn StagingStore>,
        warehouse: Arc<dyn Warehouse>,
        layout: StagingLayout,
        target: TargetTable,
        copy_options: CopyOptions,
    ) -> Self {
        Self {
            store,
            warehouse,
            layout,
            target,
            copy_options,
            leasing: None,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            report_row_count: false,
        }
    }

    /// Lease each object for `ttl` before touching it.
    pub fn with_lease(mut self, store: Arc<dyn LeaseStore>, ttl: Duration) -> Self {
        self.leasing = Some(Leasing { store, ttl });
        self
    }

    /// Deadlines for staging store calls and for one bulk load.
    pub fn with_timeouts(mut self, store_timeout: Duration, load_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self.load_timeout = load_timeout;
        self
    }

    /// Log the table row count after a drain that loaded anything.
    pub fn with_row_count_report(mut self, enabled: bool) -> Self {
        self.report_row_count = enabled;
        self
    }

    /// Process every object currently under the pending prefix.
    ///
    /// Only a failure to list is returned as an error; per-object failures
    /// are collected in the report.
    pub async fn drain(&self) -> Result<DrainReport, MoverError> {
        let prefix = self.layout.pending_dir();
        let keys = with_deadline(self.store_timeout, self.store.list(&prefix), || {
            StagingError::Timeout {
                operation: "list",
                key: prefix.clone(),
                after: self.store_timeout,
            }
        })
        .await
        .map_err(MoverError::List)?;

        #[cfg(feature = "otel")]
        crate::utils::metrics::STAGING_PENDING.record(keys.len() as u64, &[]);

        let mut report = DrainReport {
            pending: keys.len(),
            ..Default::default()
        };

        if keys.is_empty() {
            info!(prefix = %prefix, "No pending staged objects");
            return Ok(report);
        }

        info!(
            prefix = %prefix,
            pending = keys.len(),
            backend = self.store.storage_type(),
            "Draining pending staged objects"
        );

        let holder = Uuid::new_v4().to_string();
        for key in &keys {
            if let Err(failure) = self.process(key, &holder, &mut report).await {
                if failure.is_fatal() {
                    warn!(key = %key, error = %failure, "Staged object not processed");
                } else {
                    warn!(
                        key = %key,
                        error = %failure,
                        "Staged object loaded but still pending; next drain loads it again"
                    );
                }
                report.failures.push(failure);
            }
        }

        if self.report_row_count && report.loaded > 0 {
            self.log_row_count().await;
        }

        info!(
            pending = report.pending,
            loaded = report.loaded,
            moved = report.moved,
            skipped_leased = report.skipped_leased,
            failed = report.failures.len(),
            "Drain finished"
        );
        Ok(report)
    }

    async fn process(
        &self,
        key: &str,
        holder: &str,
        report: &mut DrainReport,
    ) -> Result<(), DrainFailure> {
        let kind = StagedObjectKind::classify(key).ok_or_else(|| DrainFailure::UnrecognizedKey {
            key: key.to_string(),
            reason: "suffix is neither a data file nor an empty-batch marker".to_string(),
        })?;
        let processed_key =
            self.layout
                .processed_key_for(key)
                .map_err(|e| DrainFailure::UnrecognizedKey {
                    key: key.to_string(),
                    reason: e.to_string(),
                })?;

        if let Some(leasing) = &self.leasing {
            let acquired = with_deadline(
                self.store_timeout,
                leasing.store.acquire(key, holder, leasing.ttl),
                || LeaseError::Timeout {
                    operation: "acquire",
                    key: key.to_string(),
                    after: self.store_timeout,
                },
            )
            .await
            .map_err(|source| DrainFailure::Lease {
                key: key.to_string(),
                source,
            })?;
            if !acquired {
                debug!(key = %key, "Lease held by another invocation, skipping");
                report.skipped_leased += 1;
                return Ok(());
            }
        }

        let outcome = if self.leasing.is_some() {
            self.transition_if_pending(key, kind, &processed_key, report)
                .await
        } else {
            self.transition(key, kind, &processed_key, report).await
        };

        if let Some(leasing) = &self.leasing {
            let released = with_deadline(
                self.store_timeout,
                leasing.store.release(key, holder),
                || LeaseError::Timeout {
                    operation: "release",
                    key: key.to_string(),
                    after: self.store_timeout,
                },
            )
            .await;
            if let Err(e) = released {
                warn!(key = %key, error = %e, "Failed to release lease");
            }
        }

        outcome
    }

    /// Under a lease, the object may already have been moved by an
    /// invocation that listed it earlier and released its lease since.
    async fn transition_if_pending(
        &self,
        key: &str,
        kind: StagedObjectKind,
        processed_key: &str,
        report: &mut DrainReport,
    ) -> Result<(), DrainFailure> {
        let exists = with_deadline(self.store_timeout, self.store.exists(key), || {
            StagingError::Timeout {
                operation: "exists",
                key: key.to_string(),
                after: self.store_timeout,
            }
        })
        .await
        .map_err(|source| DrainFailure::Exists {
            key: key.to_string(),
            source,
        })?;

        if !exists {
            debug!(key = %key, "Already processed by another invocation, skipping");
            report.skipped_leased += 1;
            return Ok(());
        }
        self.transition(key, kind, processed_key, report).await
    }

    async fn transition(
        &self,
        key: &str,
        kind: StagedObjectKind,
        processed_key: &str,
        report: &mut DrainReport,
    ) -> Result<(), DrainFailure> {
        let loaded = match kind {
            StagedObjectKind::Data => {
                self.load(key).await?;
                report.loaded += 1;
                true
            }
            StagedObjectKind::EmptyMarker => false,
        };

        let moved = with_deadline(
            self.store_timeout,
            self.store.move_object(key, processed_key),
            || StagingError::Timeout {
                operation: "move",
                key: key.to_string(),
                after: self.store_timeout,
            },
        )
        .await;

        #[cfg(feature = "otel")]
        {
            use crate::utils::metrics::{kind_attr, outcome_attr, MOVE_TOTAL};
            let outcome = if moved.is_ok() { "success" } else { "error" };
            MOVE_TOTAL.add(1, &[outcome_attr(outcome), kind_attr(kind.as_str())]);
        }

        moved.map_err(|source| DrainFailure::Move {
            key: key.to_string(),
            loaded,
            source,
        })?;
        report.moved += 1;

        info!(
            from = %key,
            to = %processed_key,
            kind = kind.as_str(),
            "Moved staged object to processed"
        );
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<(), DrainFailure> {
        let statement = copy_statement(&self.target, &self.store.uri(key), &self.copy_options);
        let started = Instant::now();

        let result = with_deadline(
            self.load_timeout,
            self.warehouse.execute(std::slice::from_ref(&statement)),
            || WarehouseError::Timeout {
                operation: "load",
                after: self.load_timeout,
            },
        )
        .await;

        #[cfg(feature = "otel")]
        {
            use crate::utils::metrics::{outcome_attr, LOAD_DURATION, LOAD_TOTAL};
            let outcome = if result.is_ok() { "success" } else { "error" };
            LOAD_TOTAL.add(1, &[outcome_attr(outcome)]);
            LOAD_DURATION.record(started.elapsed().as_secs_f64(), &[outcome_attr(outcome)]);
        }

        result.map_err(|source| DrainFailure::Load {
            key: key.to_string(),
            source,
        })?;

        info!(
            key = %key,
            target_table = %self.target,
            duration_ms = started.elapsed().as_millis() as u64,
            "Loaded staged object"
        );
        Ok(())
    }

    async fn log_row_count(&self) {
        let sql = self.target.count_sql();
        let count = with_deadline(
            self.load_timeout,
            self.warehouse.query_scalar_i64(&sql),
            || WarehouseError::Timeout {
                operation: "row count",
                after: self.load_timeout,
            },
        )
        .await;
        match count {
            Ok(rows) => info!(target_table = %self.target, rows, "Warehouse table row count"),
            Err(e) => warn!(target_table = %self.target, error = %e, "Failed to count warehouse rows"),
        }
    }
}
