use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{ErrorKind, UpsertResult};
use crate::store::base::{PendingVersion, VersionStore};
use crate::types::{KeyedRow, Version, VersionEntry};
use crate::{bail, upsert_error};

/// Committed versions of one table.
///
/// `entries[i]` and `rows[i]` both describe version `i`.
#[derive(Debug, Default)]
struct TableState {
    entries: Vec<VersionEntry>,
    rows: Vec<Arc<Vec<KeyedRow>>>,
}

impl TableState {
    fn latest_version(&self) -> Option<Version> {
        self.entries.last().map(|entry| entry.version)
    }

    fn position(&self, table: &str, version: Version) -> UpsertResult<usize> {
        let position = usize::try_from(version.into_inner()).ok();
        match position {
            Some(position) if position < self.entries.len() => Ok(position),
            _ => Err(upsert_error!(
                ErrorKind::VersionNotFound,
                "Table version does not exist",
                format!("table `{table}` has no version {version}")
            )),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<String, TableState>,
}

impl Inner {
    fn table(&self, table: &str) -> UpsertResult<&TableState> {
        match self.tables.get(table) {
            Some(state) => Ok(state),
            None => bail!(
                ErrorKind::TableNotFound,
                "Table does not exist",
                format!("table `{table}`")
            ),
        }
    }
}

/// Version store that keeps every table in memory.
///
/// Versions are lost when the last clone of the store is dropped. Used by tests and for
/// dry runs.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionStore for MemoryStore {
    async fn latest_version(&self, table: &str) -> UpsertResult<Option<Version>> {
        let inner = self.inner.lock().await;

        Ok(inner.tables.get(table).and_then(TableState::latest_version))
    }

    async fn versions(&self, table: &str) -> UpsertResult<Vec<Version>> {
        let inner = self.inner.lock().await;
        let state = inner.table(table)?;

        Ok(state.entries.iter().map(|entry| entry.version).collect())
    }

    async fn entry(&self, table: &str, version: Version) -> UpsertResult<VersionEntry> {
        let inner = self.inner.lock().await;
        let state = inner.table(table)?;
        let position = state.position(table, version)?;

        Ok(state.entries[position].clone())
    }

    async fn read_version(
        &self,
        table: &str,
        version: Version,
    ) -> UpsertResult<(VersionEntry, Arc<Vec<KeyedRow>>)> {
        let inner = self.inner.lock().await;
        let state = inner.table(table)?;
        let position = state.position(table, version)?;

        Ok((
            state.entries[position].clone(),
            state.rows[position].clone(),
        ))
    }

    async fn commit(&self, table: &str, pending: PendingVersion) -> UpsertResult<VersionEntry> {
        let mut inner = self.inner.lock().await;

        let latest = inner
            .tables
            .get(table)
            .and_then(TableState::latest_version);
        pending.check_parent(table, latest)?;

        let (entry, rows) = pending.into_parts();
        let state = inner.tables.entry(table.to_string()).or_default();
        state.entries.push(entry.clone());
        state.rows.push(rows);

        debug!(table, version = %entry.version, "committed version to memory store");

        Ok(entry)
    }
}
