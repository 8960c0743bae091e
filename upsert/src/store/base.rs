use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{ErrorKind, UpsertResult};
use crate::keying::KeySpec;
use crate::types::{KeyedRow, Operation, OperationMetrics, TableSchema, Version, VersionEntry};
use crate::upsert_error;

/// A fully computed version waiting to be committed.
#[derive(Debug, Clone)]
pub struct PendingVersion {
    /// Version the rows were computed from, `None` when creating the table.
    pub parent: Option<Version>,
    pub timestamp: DateTime<Utc>,
    pub operation: Operation,
    pub metrics: OperationMetrics,
    pub schema: TableSchema,
    pub key_spec: KeySpec,
    pub rows: Arc<Vec<KeyedRow>>,
}

impl PendingVersion {
    /// Version number this commit will receive if it wins.
    pub fn version(&self) -> Version {
        self.parent.map(Version::next).unwrap_or(Version::INITIAL)
    }

    /// Checks that `latest`, the newest committed version, is still the parent.
    ///
    /// Fails with [`ErrorKind::ConcurrentModification`] otherwise.
    pub fn check_parent(&self, table: &str, latest: Option<Version>) -> UpsertResult<()> {
        if latest == self.parent {
            return Ok(());
        }

        let render = |version: Option<Version>| match version {
            Some(version) => version.to_string(),
            None => "none".to_string(),
        };

        Err(upsert_error!(
            ErrorKind::ConcurrentModification,
            "Table was modified by a concurrent commit",
            format!(
                "table `{table}`: expected latest version {}, found {}",
                render(self.parent),
                render(latest)
            )
        ))
    }

    /// Splits the pending version into the log entry for `version` and its rows.
    pub fn into_parts(self) -> (VersionEntry, Arc<Vec<KeyedRow>>) {
        let entry = VersionEntry {
            version: self.version(),
            parent: self.parent,
            timestamp: self.timestamp,
            operation: self.operation,
            metrics: self.metrics,
            schema: self.schema,
            key_spec: self.key_spec,
        };

        (entry, self.rows)
    }
}

/// Storage for the versions of a set of tables.
///
/// Committed versions are immutable. [`VersionStore::commit`] is the only mutation and is
/// atomic: either the new version is fully visible to every reader or not at all.
pub trait VersionStore: Clone + Send + Sync {
    /// Returns the newest committed version of `table`, `None` when the table does not exist.
    fn latest_version(
        &self,
        table: &str,
    ) -> impl Future<Output = UpsertResult<Option<Version>>> + Send;

    /// Returns all committed versions of `table` in ascending order.
    ///
    /// Fails with [`ErrorKind::TableNotFound`] when the table does not exist.
    fn versions(&self, table: &str) -> impl Future<Output = UpsertResult<Vec<Version>>> + Send;

    /// Returns the log entry of one version.
    fn entry(
        &self,
        table: &str,
        version: Version,
    ) -> impl Future<Output = UpsertResult<VersionEntry>> + Send;

    /// Returns the log entry and the rows of one version.
    fn read_version(
        &self,
        table: &str,
        version: Version,
    ) -> impl Future<Output = UpsertResult<(VersionEntry, Arc<Vec<KeyedRow>>)>> + Send;

    /// Atomically publishes `pending` as the next version of `table`.
    ///
    /// Fails with [`ErrorKind::ConcurrentModification`] when `pending.parent` is no longer
    /// the latest version, leaving the table untouched.
    fn commit(
        &self,
        table: &str,
        pending: PendingVersion,
    ) -> impl Future<Output = UpsertResult<VersionEntry>> + Send;

    /// Returns the newest version of `table` with its rows.
    fn latest(
        &self,
        table: &str,
    ) -> impl Future<Output = UpsertResult<Option<(VersionEntry, Arc<Vec<KeyedRow>>)>>> + Send
    {
        async move {
            let Some(version) = self.latest_version(table).await? else {
                return Ok(None);
            };

            self.read_version(table, version).await.map(Some)
        }
    }
}
