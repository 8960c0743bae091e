use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use config::shared::MergeConfig;
use telemetry::init_test_tracing;
use upsert::error::{ErrorKind, UpsertResult};
use upsert::merge::MergeEngine;
use upsert::store::{FilesystemStore, MemoryStore, PendingVersion, VersionStore};
use upsert::test_utils::rows::{TRADES_TABLE, trade_batch, trade_key_spec, trade_row, trade_schema};
use upsert::types::{KeyedRow, Operation, OperationMetrics, Version, VersionEntry};

/// Store that lets a competing writer commit right before the first commit it forwards.
#[derive(Debug, Clone)]
struct RacingStore<S> {
    inner: S,
    raced: Arc<AtomicBool>,
}

impl<S> RacingStore<S> {
    fn new(inner: S) -> Self {
        Self {
            inner,
            raced: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl<S: VersionStore> VersionStore for RacingStore<S> {
    async fn latest_version(&self, table: &str) -> UpsertResult<Option<Version>> {
        self.inner.latest_version(table).await
    }

    async fn versions(&self, table: &str) -> UpsertResult<Vec<Version>> {
        self.inner.versions(table).await
    }

    async fn entry(&self, table: &str, version: Version) -> UpsertResult<VersionEntry> {
        self.inner.entry(table, version).await
    }

    async fn read_version(
        &self,
        table: &str,
        version: Version,
    ) -> UpsertResult<(VersionEntry, Arc<Vec<KeyedRow>>)> {
        self.inner.read_version(table, version).await
    }

    async fn commit(&self, table: &str, pending: PendingVersion) -> UpsertResult<VersionEntry> {
        if !self.raced.swap(true, Ordering::SeqCst) {
            let competitor = PendingVersion {
                operation: Operation::Merge,
                metrics: OperationMetrics::default(),
                rows: Arc::new(Vec::new()),
                ..pending.clone()
            };
            self.inner.commit(table, competitor).await?;
        }

        self.inner.commit(table, pending).await
    }
}

fn pending(parent: Option<Version>) -> PendingVersion {
    PendingVersion {
        parent,
        timestamp: Utc::now(),
        operation: Operation::Merge,
        metrics: OperationMetrics::default(),
        schema: trade_schema(),
        key_spec: trade_key_spec(),
        rows: Arc::new(vec![]),
    }
}

async fn only_one_commit_wins<S: VersionStore>(store: S) {
    store.commit(TRADES_TABLE, pending(None)).await.unwrap();

    let first = store.commit(TRADES_TABLE, pending(Some(Version(0)))).await;
    let second = store.commit(TRADES_TABLE, pending(Some(Version(0)))).await;

    assert_eq!(first.unwrap().version, Version(1));
    assert_eq!(
        second.unwrap_err().kind(),
        ErrorKind::ConcurrentModification
    );
    assert_eq!(
        store.versions(TRADES_TABLE).await.unwrap(),
        vec![Version(0), Version(1)]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn memory_store_accepts_one_commit_per_parent() {
    init_test_tracing();
    only_one_commit_wins(MemoryStore::new()).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn filesystem_store_accepts_one_commit_per_parent() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    only_one_commit_wins(FilesystemStore::new(dir.path())).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_commits_from_separate_handles_never_both_win() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = FilesystemStore::new(dir.path());
    store.commit(TRADES_TABLE, pending(None)).await.unwrap();

    // Separate handles do not share the in-process lock, only the filesystem.
    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = FilesystemStore::new(dir.path());
        handles.push(tokio::spawn(async move {
            store.commit(TRADES_TABLE, pending(Some(Version(0)))).await
        }));
    }

    let mut wins = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(entry) => {
                assert_eq!(entry.version, Version(1));
                wins += 1;
            }
            Err(err) => assert_eq!(err.kind(), ErrorKind::ConcurrentModification),
        }
    }

    assert_eq!(wins, 1);
    assert_eq!(
        store.latest_version(TRADES_TABLE).await.unwrap(),
        Some(Version(1))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn merge_surfaces_conflict_without_retries() {
    init_test_tracing();
    let store = RacingStore::new(MemoryStore::new());
    let config = MergeConfig {
        max_commit_retries: 0,
        ..Default::default()
    };
    let engine = MergeEngine::new(store.clone(), TRADES_TABLE, config);
    store
        .inner
        .commit(TRADES_TABLE, pending(None))
        .await
        .unwrap();

    let err = engine
        .merge_with_retry(&trade_batch(vec![trade_row("2022-01-03", "B1", "IBM", 1, 1.0)]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConcurrentModification);
    assert_eq!(
        store.latest_version(TRADES_TABLE).await.unwrap(),
        Some(Version(1))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn merge_retries_against_the_new_latest_version() {
    init_test_tracing();
    let store = RacingStore::new(MemoryStore::new());
    let config = MergeConfig {
        max_commit_retries: 2,
        initial_retry_delay_ms: 1,
        max_retry_delay_ms: 5,
        ..Default::default()
    };
    let engine = MergeEngine::new(store.clone(), TRADES_TABLE, config);
    store
        .inner
        .commit(TRADES_TABLE, pending(None))
        .await
        .unwrap();

    let outcome = engine
        .merge_with_retry(&trade_batch(vec![trade_row("2022-01-03", "B1", "IBM", 1, 1.0)]))
        .await
        .unwrap();

    // The competitor took version 1, the retried merge was computed from it.
    assert_eq!(outcome.entry.parent, Some(Version(1)));
    assert_eq!(outcome.entry.version, Version(2));
    assert_eq!(outcome.metrics().num_inserted_rows, 1);
}
