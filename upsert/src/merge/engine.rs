use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use config::shared::MergeConfig;
use metrics::{counter, histogram};
use tracing::{debug, info, warn};

use crate::batch::SourceBatch;
use crate::bail;
use crate::error::{ErrorKind, UpsertResult};
use crate::keying::RowKeyer;
use crate::merge::plan::merge_rows;
use crate::merge::report::OperationReport;
use crate::metrics::{
    OPERATION_LABEL, TABLE_NAME_LABEL, UPSERT_COMMIT_CONFLICTS_TOTAL,
    UPSERT_COMMIT_DURATION_SECONDS, UPSERT_COMMITS_TOTAL, UPSERT_ROWS_DELETED_TOTAL,
    UPSERT_ROWS_INSERTED_TOTAL, UPSERT_ROWS_UPDATED_TOTAL,
};
use crate::snapshot::{SnapshotReader, TableSnapshot};
use crate::store::{History, PendingVersion, VersionStore};
use crate::types::{Operation, OperationMetrics, VersionEntry};

/// Result of a successful bootstrap or merge.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Log entry of the committed version.
    pub entry: VersionEntry,
    /// The committed version.
    pub snapshot: TableSnapshot,
    pub report: OperationReport,
}

impl MergeOutcome {
    pub fn metrics(&self) -> &OperationMetrics {
        &self.entry.metrics
    }
}

/// Applies source batches to one table of a [`VersionStore`].
///
/// Every successful call commits exactly one new version. A failed call commits nothing,
/// the table stays at its last committed version.
#[derive(Debug, Clone)]
pub struct MergeEngine<S> {
    store: S,
    table: String,
    config: MergeConfig,
}

impl<S> MergeEngine<S>
where
    S: VersionStore,
{
    pub fn new(store: S, table: impl Into<String>, config: MergeConfig) -> Self {
        Self {
            store,
            table: table.into(),
            config,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    pub fn snapshot_reader(&self) -> SnapshotReader<S> {
        SnapshotReader::new(self.store.clone())
    }

    /// Returns the newest `limit` versions of the table.
    pub async fn history(&self, limit: usize) -> UpsertResult<History<S>> {
        History::load(self.store.clone(), self.table.clone(), limit).await
    }

    /// Creates the table from `source` as version 0.
    ///
    /// Fails with [`ErrorKind::ConcurrentModification`] when the table already exists.
    pub async fn bootstrap(&self, source: &SourceBatch) -> UpsertResult<MergeOutcome> {
        let started = Instant::now();
        // Resolving the key spec validates the schema before anything is written.
        RowKeyer::new(source.schema(), source.key_spec().clone())?;

        let committed_at = Utc::now();
        let rows: Vec<_> = source
            .rows()
            .iter()
            .cloned()
            .map(|mut row| {
                row.last_updated = committed_at;
                row
            })
            .collect();

        let metrics = OperationMetrics {
            num_source_rows: source.len() as u64,
            num_inserted_rows: rows.len() as u64,
            num_output_rows: rows.len() as u64,
            execution_time_ms: elapsed_ms(started),
            ..Default::default()
        };

        let pending = PendingVersion {
            parent: None,
            timestamp: committed_at,
            operation: Operation::Bootstrap,
            metrics,
            schema: source.schema().clone(),
            key_spec: source.key_spec().clone(),
            rows: Arc::new(rows),
        };

        self.commit(pending, started).await
    }

    /// Merges `source` into the latest version of the table.
    ///
    /// Fails with [`ErrorKind::TableNotFound`] when the table does not exist, with
    /// [`ErrorKind::SchemaError`] when `source` does not match the table and with
    /// [`ErrorKind::ConcurrentModification`] when another commit lands first.
    pub async fn merge(&self, source: &SourceBatch) -> UpsertResult<MergeOutcome> {
        let started = Instant::now();

        let Some((target_entry, target_rows)) = self.store.latest(&self.table).await? else {
            bail!(
                ErrorKind::TableNotFound,
                "Cannot merge into a table that does not exist",
                format!("table `{}`", self.table)
            );
        };

        if !source.schema().is_compatible_with(&target_entry.schema) {
            bail!(
                ErrorKind::SchemaError,
                "Source schema does not match the table schema",
                format!(
                    "table `{}` has [{}], source has [{}]",
                    self.table,
                    target_entry.schema,
                    source.schema()
                )
            );
        }
        if source.key_spec() != &target_entry.key_spec {
            bail!(
                ErrorKind::SchemaError,
                "Source key columns do not match the table key columns",
                format!(
                    "table `{}` is keyed by {:?}, source by {:?}",
                    self.table,
                    target_entry.key_spec,
                    source.key_spec()
                )
            );
        }

        let merged_at = Utc::now();
        let (rows, mut metrics) = merge_rows(source, &target_rows, merged_at)?;
        metrics.execution_time_ms = elapsed_ms(started);
        debug!(
            table = %self.table,
            parent = %target_entry.version,
            deletes = metrics.num_deleted_rows,
            updates = metrics.num_updated_rows,
            inserts = metrics.num_inserted_rows,
            unchanged = metrics.num_copied_rows,
            "merged source rows"
        );

        let pending = PendingVersion {
            parent: Some(target_entry.version),
            timestamp: merged_at,
            operation: Operation::Merge,
            metrics,
            schema: target_entry.schema,
            key_spec: target_entry.key_spec,
            rows: Arc::new(rows),
        };

        self.commit(pending, started).await
    }

    /// Runs [`MergeEngine::merge`], re-running it against the fresh latest version when the
    /// commit loses to a concurrent writer.
    ///
    /// Gives up after `max_commit_retries` retries, waiting with exponential backoff between
    /// attempts. Other errors are returned immediately.
    pub async fn merge_with_retry(&self, source: &SourceBatch) -> UpsertResult<MergeOutcome> {
        let mut attempt = 0;

        loop {
            match self.merge(source).await {
                Err(err)
                    if err.kind().is_retryable() && attempt < self.config.max_commit_retries =>
                {
                    attempt += 1;
                    let delay = self.config.retry_delay(attempt);
                    warn!(
                        table = %self.table,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "merge lost a commit race, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    /// Bootstraps the table when it does not exist yet and merges into it otherwise.
    ///
    /// The operation of the returned entry tells which path ran.
    pub async fn upsert(&self, source: &SourceBatch) -> UpsertResult<MergeOutcome> {
        if self.store.latest_version(&self.table).await?.is_none() {
            match self.bootstrap(source).await {
                Err(err) if err.kind() == ErrorKind::ConcurrentModification => {
                    debug!(table = %self.table, "table was created concurrently, merging instead");
                }
                result => return result,
            }
        }

        self.merge_with_retry(source).await
    }

    async fn commit(&self, pending: PendingVersion, started: Instant) -> UpsertResult<MergeOutcome> {
        let operation = pending.operation;
        let rows = pending.rows.clone();

        let entry = match self.store.commit(&self.table, pending).await {
            Ok(entry) => entry,
            Err(err) => {
                if err.kind() == ErrorKind::ConcurrentModification {
                    counter!(UPSERT_COMMIT_CONFLICTS_TOTAL, TABLE_NAME_LABEL => self.table.clone())
                        .increment(1);
                }
                return Err(err);
            }
        };

        let labels = [
            (TABLE_NAME_LABEL, self.table.clone()),
            (OPERATION_LABEL, operation.to_string()),
        ];
        counter!(UPSERT_COMMITS_TOTAL, &labels).increment(1);
        counter!(UPSERT_ROWS_INSERTED_TOTAL, &labels).increment(entry.metrics.num_inserted_rows);
        counter!(UPSERT_ROWS_UPDATED_TOTAL, &labels).increment(entry.metrics.num_updated_rows);
        counter!(UPSERT_ROWS_DELETED_TOTAL, &labels).increment(entry.metrics.num_deleted_rows);
        histogram!(UPSERT_COMMIT_DURATION_SECONDS, &labels).record(started.elapsed().as_secs_f64());

        let report = OperationReport::new(&self.table, &entry);
        info!(
            table = %self.table,
            version = %entry.version,
            %operation,
            inserted = entry.metrics.num_inserted_rows,
            updated = entry.metrics.num_updated_rows,
            deleted = entry.metrics.num_deleted_rows,
            execution_time_ms = entry.metrics.execution_time_ms,
            "committed table version\n{report}"
        );

        Ok(MergeOutcome {
            snapshot: TableSnapshot::new(entry.clone(), rows),
            entry,
            report,
        })
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
