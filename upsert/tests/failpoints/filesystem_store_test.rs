use config::shared::MergeConfig;
use telemetry::init_test_tracing;
use upsert::FILESYSTEM_STORE_BEFORE_LOG_ENTRY;
use upsert::error::ErrorKind;
use upsert::merge::MergeEngine;
use upsert::store::{FilesystemStore, VersionStore};
use upsert::test_utils::failpoints::FailpointScenario;
use upsert::test_utils::rows::{TRADES_TABLE, trade_batch, trade_row};
use upsert::types::Version;

fn data_file_count(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir.join(TRADES_TABLE).join("data"))
        .map(|entries| entries.count())
        .unwrap_or(0)
}

#[tokio::test(flavor = "multi_thread")]
async fn io_failure_before_publishing_keeps_previous_version() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    let engine = MergeEngine::new(
        FilesystemStore::new(dir.path()),
        TRADES_TABLE,
        MergeConfig::default(),
    );
    let bootstrap = engine
        .upsert(&trade_batch(vec![trade_row("2022-01-03", "B1", "IBM", 100, 10.0)]))
        .await
        .unwrap();

    let scenario = FailpointScenario::enable(&[(FILESYSTEM_STORE_BEFORE_LOG_ENTRY, "return")]);
    let err = engine
        .upsert(&trade_batch(vec![trade_row("2022-01-03", "B2", "IBM", 5, 1.0)]))
        .await
        .unwrap_err();
    drop(scenario);

    assert_eq!(err.kind(), ErrorKind::IoError);

    let (entry, rows) = engine.store().latest(TRADES_TABLE).await.unwrap().unwrap();
    assert_eq!(entry.version, Version::INITIAL);
    assert_eq!(rows.as_slice(), bootstrap.snapshot.rows());
    // The orphaned data file of the failed commit is removed.
    assert_eq!(data_file_count(dir.path()), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn injected_conflicts_are_retried_until_the_budget_runs_out() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = MergeConfig {
        max_commit_retries: 2,
        initial_retry_delay_ms: 1,
        max_retry_delay_ms: 2,
        ..Default::default()
    };
    let engine = MergeEngine::new(FilesystemStore::new(dir.path()), TRADES_TABLE, config);
    engine
        .upsert(&trade_batch(vec![trade_row("2022-01-03", "B1", "IBM", 100, 10.0)]))
        .await
        .unwrap();

    let scenario =
        FailpointScenario::enable(&[(FILESYSTEM_STORE_BEFORE_LOG_ENTRY, "return(conflict)")]);
    let err = engine
        .upsert(&trade_batch(vec![trade_row("2022-01-03", "B1", "IBM", 1, 1.0)]))
        .await
        .unwrap_err();
    drop(scenario);

    assert_eq!(err.kind(), ErrorKind::ConcurrentModification);
    assert_eq!(
        engine.store().latest_version(TRADES_TABLE).await.unwrap(),
        Some(Version::INITIAL)
    );

    let outcome = engine
        .upsert(&trade_batch(vec![trade_row("2022-01-03", "B1", "IBM", 1, 1.0)]))
        .await
        .unwrap();
    assert_eq!(outcome.entry.version, Version(1));
    assert_eq!(outcome.metrics().num_updated_rows, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn one_transient_conflict_is_absorbed_by_a_retry() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = MergeConfig {
        max_commit_retries: 1,
        initial_retry_delay_ms: 1,
        max_retry_delay_ms: 1,
        ..Default::default()
    };
    let engine = MergeEngine::new(FilesystemStore::new(dir.path()), TRADES_TABLE, config);
    engine
        .upsert(&trade_batch(vec![trade_row("2022-01-03", "B1", "IBM", 100, 10.0)]))
        .await
        .unwrap();

    let scenario =
        FailpointScenario::enable(&[(FILESYSTEM_STORE_BEFORE_LOG_ENTRY, "1*return(conflict)")]);
    let outcome = engine
        .upsert(&trade_batch(vec![trade_row("2022-01-03", "B2", "IBM", 5, 1.0)]))
        .await
        .unwrap();
    drop(scenario);

    assert_eq!(outcome.entry.version, Version(1));
    assert_eq!(outcome.metrics().num_inserted_rows, 1);
    assert_eq!(outcome.metrics().num_deleted_rows, 1);
}
