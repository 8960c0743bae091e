use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt, TryStreamExt, stream};

use crate::error::UpsertResult;
use crate::store::base::VersionStore;
use crate::types::{Operation, OperationMetrics, Version, VersionEntry};

/// Summary of one committed version as reported by [`History`].
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub version: Version,
    pub timestamp: DateTime<Utc>,
    pub operation: Operation,
    pub metrics: OperationMetrics,
}

impl From<VersionEntry> for HistoryEntry {
    fn from(entry: VersionEntry) -> Self {
        Self {
            version: entry.version,
            timestamp: entry.timestamp,
            operation: entry.operation,
            metrics: entry.metrics,
        }
    }
}

/// The most recent versions of a table, newest first.
///
/// Only version numbers are fetched up front. Log entries are loaded lazily by
/// [`History::stream`], and every call to it starts again from the newest version.
#[derive(Debug, Clone)]
pub struct History<S> {
    store: S,
    table: String,
    versions: Vec<Version>,
}

impl<S> History<S>
where
    S: VersionStore,
{
    /// Captures the newest `limit` versions of `table` committed so far.
    pub async fn load(store: S, table: impl Into<String>, limit: usize) -> UpsertResult<Self> {
        let table = table.into();
        let mut versions = store.versions(&table).await?;
        versions.reverse();
        versions.truncate(limit);

        Ok(Self {
            store,
            table,
            versions,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Version numbers covered by this history, newest first.
    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Streams the entries newest first, reading each log entry when it is polled.
    pub fn stream(&self) -> impl Stream<Item = UpsertResult<HistoryEntry>> + Send + '_ {
        stream::iter(self.versions.iter().copied()).then(move |version| async move {
            let entry = self.store.entry(&self.table, version).await?;

            Ok(HistoryEntry::from(entry))
        })
    }

    /// Loads every entry of the history.
    pub async fn entries(&self) -> UpsertResult<Vec<HistoryEntry>> {
        self.stream().try_collect().await
    }
}
