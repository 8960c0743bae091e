//! Read-only access to committed table versions.

use std::sync::Arc;

use crate::error::{ErrorKind, UpsertResult};
use crate::keying::KeySpec;
use crate::store::VersionStore;
use crate::types::{KeyedRow, TableSchema, Version, VersionEntry};
use crate::bail;

/// The rows of one committed version of a table.
#[derive(Debug, Clone)]
pub struct TableSnapshot {
    entry: VersionEntry,
    rows: Arc<Vec<KeyedRow>>,
}

impl TableSnapshot {
    pub fn new(entry: VersionEntry, rows: Arc<Vec<KeyedRow>>) -> Self {
        Self { entry, rows }
    }

    pub fn version(&self) -> Version {
        self.entry.version
    }

    pub fn entry(&self) -> &VersionEntry {
        &self.entry
    }

    pub fn schema(&self) -> &TableSchema {
        &self.entry.schema
    }

    pub fn key_spec(&self) -> &KeySpec {
        &self.entry.key_spec
    }

    pub fn rows(&self) -> &[KeyedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Reads consistent snapshots of tables from a [`VersionStore`].
#[derive(Debug, Clone)]
pub struct SnapshotReader<S> {
    store: S,
}

impl<S> SnapshotReader<S>
where
    S: VersionStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Reads `version` of `table`, or its latest version when `version` is `None`.
    ///
    /// Fails with [`ErrorKind::TableNotFound`] when the table has no committed version and
    /// with [`ErrorKind::VersionNotFound`] when the requested version does not exist.
    pub async fn read(&self, table: &str, version: Option<Version>) -> UpsertResult<TableSnapshot> {
        let version = match version {
            Some(version) => version,
            None => match self.store.latest_version(table).await? {
                Some(version) => version,
                None => bail!(
                    ErrorKind::TableNotFound,
                    "Table does not exist",
                    format!("table `{table}`")
                ),
            },
        };

        let (entry, rows) = self.store.read_version(table, version).await?;

        Ok(TableSnapshot::new(entry, rows))
    }

    /// Reads the latest version of `table`, `None` when the table does not exist.
    pub async fn try_read_latest(&self, table: &str) -> UpsertResult<Option<TableSnapshot>> {
        Ok(self
            .store
            .latest(table)
            .await?
            .map(|(entry, rows)| TableSnapshot::new(entry, rows)))
    }
}
