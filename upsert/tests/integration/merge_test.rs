use config::shared::MergeConfig;
use telemetry::init_test_tracing;
use upsert::error::ErrorKind;
use upsert::merge::{MergeEngine, merge_rows};
use upsert::store::{MemoryStore, VersionStore};
use upsert::test_utils::fault_store::{FaultConfig, FaultInjectingStore, FaultType};
use upsert::test_utils::rows::{TRADES_TABLE, trade_batch, trade_row};
use upsert::types::{Operation, OperationMetrics, Version};

fn engine<S: VersionStore>(store: S) -> MergeEngine<S> {
    MergeEngine::new(store, TRADES_TABLE, MergeConfig::default())
}

#[tokio::test(flavor = "multi_thread")]
async fn first_batch_bootstraps_version_zero() {
    init_test_tracing();
    let engine = engine(MemoryStore::new());

    let outcome = engine
        .upsert(&trade_batch(vec![
            trade_row("2022-01-03", "B1", "IBM", 100, 10.0),
            trade_row("2022-01-03", "B2", "AAPL", 50, 20.0),
        ]))
        .await
        .unwrap();

    assert_eq!(outcome.entry.version, Version::INITIAL);
    assert_eq!(outcome.entry.operation, Operation::Bootstrap);
    assert_eq!(outcome.entry.parent, None);
    assert_eq!(outcome.metrics().num_inserted_rows, 2);
    assert_eq!(outcome.metrics().num_output_rows, 2);
    assert!(
        outcome
            .snapshot
            .rows()
            .iter()
            .all(|row| row.last_updated == outcome.entry.timestamp)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn bootstrap_of_existing_table_is_a_conflict() {
    init_test_tracing();
    let engine = engine(MemoryStore::new());
    let batch = trade_batch(vec![trade_row("2022-01-03", "B1", "IBM", 100, 10.0)]);

    engine.bootstrap(&batch).await.unwrap();
    let err = engine.bootstrap(&batch).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConcurrentModification);
    assert_eq!(
        engine.store().latest_version(TRADES_TABLE).await.unwrap(),
        Some(Version::INITIAL)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn merge_into_missing_table_fails() {
    init_test_tracing();
    let engine = engine(MemoryStore::new());

    let err = engine
        .merge(&trade_batch(vec![trade_row("2022-01-03", "B1", "IBM", 1, 1.0)]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TableNotFound);
}

#[tokio::test(flavor = "multi_thread")]
async fn new_key_is_inserted_and_unchanged_row_is_kept() {
    init_test_tracing();
    let engine = engine(MemoryStore::new());
    let bootstrap = engine
        .upsert(&trade_batch(vec![trade_row("2022-01-03", "B1", "IBM", 100, 10.0)]))
        .await
        .unwrap();

    let outcome = engine
        .upsert(&trade_batch(vec![
            trade_row("2022-01-03", "B1", "IBM", 100, 10.0),
            trade_row("2022-01-03", "B2", "AAPL", 50, 20.0),
        ]))
        .await
        .unwrap();

    assert_eq!(outcome.entry.version, Version(1));
    assert_eq!(outcome.entry.parent, Some(Version(0)));
    assert_eq!(outcome.entry.operation, Operation::Merge);
    assert_eq!(outcome.metrics().num_inserted_rows, 1);
    assert_eq!(outcome.metrics().num_updated_rows, 0);
    assert_eq!(outcome.metrics().num_deleted_rows, 0);
    assert_eq!(outcome.metrics().num_copied_rows, 1);

    let rows = outcome.snapshot.rows();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], bootstrap.snapshot.rows()[0]);
    assert_eq!(rows[1].row, trade_row("2022-01-03", "B2", "AAPL", 50, 20.0));
    assert_eq!(rows[1].last_updated, outcome.entry.timestamp);
}

#[tokio::test(flavor = "multi_thread")]
async fn changed_row_is_updated_and_missing_row_is_deleted() {
    init_test_tracing();
    let engine = engine(MemoryStore::new());
    engine
        .upsert(&trade_batch(vec![
            trade_row("2022-01-03", "B1", "IBM", 100, 10.0),
            trade_row("2022-01-03", "B2", "AAPL", 50, 20.0),
        ]))
        .await
        .unwrap();

    let source = trade_batch(vec![trade_row("2022-01-03", "B1", "IBM", 120, 10.5)]);
    let outcome = engine.upsert(&source).await.unwrap();

    assert_eq!(outcome.metrics().num_inserted_rows, 0);
    assert_eq!(outcome.metrics().num_updated_rows, 1);
    assert_eq!(outcome.metrics().num_deleted_rows, 1);
    assert_eq!(outcome.metrics().num_output_rows, 1);

    let rows = outcome.snapshot.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].row, trade_row("2022-01-03", "B1", "IBM", 120, 10.5));
    assert_eq!(rows[0].change_key, source.rows()[0].change_key);
    assert_eq!(rows[0].last_updated, outcome.entry.timestamp);
}

#[tokio::test(flavor = "multi_thread")]
async fn committed_merge_matches_the_pure_merge() {
    init_test_tracing();
    let engine = engine(MemoryStore::new());
    let bootstrap = engine
        .upsert(&trade_batch(vec![
            trade_row("2022-01-03", "B1", "IBM", 100, 10.0),
            trade_row("2022-01-03", "B2", "AAPL", 50, 20.0),
        ]))
        .await
        .unwrap();

    let source = trade_batch(vec![
        trade_row("2022-01-03", "B2", "AAPL", 55, 20.0),
        trade_row("2022-01-03", "B3", "MSFT", 7, 300.0),
    ]);
    let outcome = engine.merge(&source).await.unwrap();
    let (expected_rows, expected_metrics) =
        merge_rows(&source, bootstrap.snapshot.rows(), outcome.entry.timestamp).unwrap();

    assert_eq!(outcome.snapshot.rows(), expected_rows.as_slice());
    assert_eq!(
        OperationMetrics {
            execution_time_ms: 0,
            ..*outcome.metrics()
        },
        expected_metrics
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn merging_the_same_batch_twice_changes_nothing() {
    init_test_tracing();
    let engine = engine(MemoryStore::new());
    let batch = trade_batch(vec![
        trade_row("2022-01-03", "B1", "IBM", 100, 10.0),
        trade_row("2022-01-03", "B2", "AAPL", 50, 20.0),
    ]);

    let first = engine.upsert(&batch).await.unwrap();
    let second = engine.upsert(&batch).await.unwrap();

    // A no-op merge still commits a version.
    assert_eq!(second.entry.version, Version(1));
    assert!(second.metrics().is_noop());
    assert_eq!(second.metrics().num_copied_rows, 2);
    assert_eq!(second.snapshot.rows(), first.snapshot.rows());
}

#[tokio::test(flavor = "multi_thread")]
async fn insert_only_update_only_and_delete_only_batches() {
    init_test_tracing();
    let engine = engine(MemoryStore::new());
    engine
        .upsert(&trade_batch(vec![trade_row("2022-01-03", "B1", "IBM", 1, 1.0)]))
        .await
        .unwrap();

    let inserted = engine
        .upsert(&trade_batch(vec![
            trade_row("2022-01-03", "B1", "IBM", 1, 1.0),
            trade_row("2022-01-04", "B1", "IBM", 2, 2.0),
        ]))
        .await
        .unwrap();
    assert_eq!(
        *inserted.metrics(),
        OperationMetrics {
            num_source_rows: 2,
            num_target_rows: 1,
            num_inserted_rows: 1,
            num_copied_rows: 1,
            num_output_rows: 2,
            execution_time_ms: inserted.metrics().execution_time_ms,
            ..Default::default()
        }
    );

    let updated = engine
        .upsert(&trade_batch(vec![
            trade_row("2022-01-03", "B1", "IBM", 3, 1.0),
            trade_row("2022-01-04", "B1", "IBM", 2, 3.0),
        ]))
        .await
        .unwrap();
    assert_eq!(updated.metrics().num_updated_rows, 2);
    assert_eq!(updated.metrics().num_inserted_rows, 0);
    assert_eq!(updated.metrics().num_deleted_rows, 0);

    let deleted = engine
        .upsert(&trade_batch(vec![trade_row("2022-01-04", "B1", "IBM", 2, 3.0)]))
        .await
        .unwrap();
    assert_eq!(deleted.metrics().num_deleted_rows, 1);
    assert_eq!(deleted.metrics().num_updated_rows, 0);
    assert_eq!(deleted.metrics().num_inserted_rows, 0);
    assert_eq!(deleted.snapshot.len(), 1);
    assert_eq!(deleted.entry.version, Version(3));
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_commit_leaves_latest_version_untouched() {
    init_test_tracing();
    let memory = MemoryStore::new();
    engine(memory.clone())
        .upsert(&trade_batch(vec![trade_row("2022-01-03", "B1", "IBM", 100, 10.0)]))
        .await
        .unwrap();

    let failing = FaultInjectingStore::wrap(
        memory.clone(),
        FaultConfig {
            commit: Some(FaultType::Error),
            ..Default::default()
        },
    );
    let err = engine(failing)
        .upsert(&trade_batch(vec![trade_row("2022-01-03", "B2", "IBM", 5, 1.0)]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::IoError);
    let (entry, rows) = memory.latest(TRADES_TABLE).await.unwrap().unwrap();
    assert_eq!(entry.version, Version::INITIAL);
    assert_eq!(rows.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_target_read_commits_nothing() {
    init_test_tracing();
    let memory = MemoryStore::new();
    engine(memory.clone())
        .upsert(&trade_batch(vec![trade_row("2022-01-03", "B1", "IBM", 100, 10.0)]))
        .await
        .unwrap();

    let failing = FaultInjectingStore::wrap(
        memory.clone(),
        FaultConfig {
            read_version: Some(FaultType::Error),
            ..Default::default()
        },
    );
    let err = engine(failing)
        .merge(&trade_batch(vec![trade_row("2022-01-03", "B1", "IBM", 1, 1.0)]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::IoError);
    assert_eq!(
        memory.latest_version(TRADES_TABLE).await.unwrap(),
        Some(Version::INITIAL)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn source_with_different_key_spec_is_rejected() {
    use chrono::Utc;
    use config::shared::DuplicateKeyPolicy;
    use upsert::batch::SourceBatch;
    use upsert::keying::KeySpec;
    use upsert::test_utils::rows::trade_schema;

    init_test_tracing();
    let engine = engine(MemoryStore::new());
    engine
        .upsert(&trade_batch(vec![trade_row("2022-01-03", "B1", "IBM", 100, 10.0)]))
        .await
        .unwrap();

    let rekeyed = SourceBatch::from_rows(
        trade_schema(),
        KeySpec::new(["trade_date", "book"], ["quantity", "price"]),
        vec![trade_row("2022-01-03", "B1", "IBM", 100, 10.0)],
        DuplicateKeyPolicy::Reject,
        Utc::now(),
    )
    .unwrap();
    let err = engine.merge(&rekeyed).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SchemaError);
}
