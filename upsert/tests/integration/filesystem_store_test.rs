use config::shared::MergeConfig;
use telemetry::init_test_tracing;
use upsert::error::ErrorKind;
use upsert::merge::MergeEngine;
use upsert::snapshot::SnapshotReader;
use upsert::store::{FilesystemStore, VersionStore};
use upsert::test_utils::rows::{TRADES_TABLE, trade_batch, trade_row};
use upsert::types::{Operation, Version};

#[tokio::test(flavor = "multi_thread")]
async fn versions_survive_reopening_the_store() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();

    let engine = MergeEngine::new(
        FilesystemStore::new(dir.path()),
        TRADES_TABLE,
        MergeConfig::default(),
    );
    let bootstrap = engine
        .upsert(&trade_batch(vec![
            trade_row("2022-01-03", "B1", "IBM", 100, 10.0),
            trade_row("2022-01-03", "B2", "AAPL", 50, 20.0),
        ]))
        .await
        .unwrap();
    let merge = engine
        .upsert(&trade_batch(vec![trade_row("2022-01-03", "B1", "IBM", 120, 10.0)]))
        .await
        .unwrap();

    let reopened = FilesystemStore::new(dir.path());
    assert_eq!(
        reopened.versions(TRADES_TABLE).await.unwrap(),
        vec![Version(0), Version(1)]
    );

    let reader = SnapshotReader::new(reopened.clone());
    let latest = reader.read(TRADES_TABLE, None).await.unwrap();
    assert_eq!(latest.version(), Version(1));
    assert_eq!(latest.entry(), &merge.entry);
    assert_eq!(latest.rows(), merge.snapshot.rows());

    let first = reader.read(TRADES_TABLE, Some(Version(0))).await.unwrap();
    assert_eq!(first.entry().operation, Operation::Bootstrap);
    assert_eq!(first.rows(), bootstrap.snapshot.rows());
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_table_and_version_are_reported() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = FilesystemStore::new(dir.path());
    let reader = SnapshotReader::new(store.clone());

    assert_eq!(store.latest_version(TRADES_TABLE).await.unwrap(), None);
    assert!(reader.try_read_latest(TRADES_TABLE).await.unwrap().is_none());
    assert_eq!(
        reader.read(TRADES_TABLE, None).await.unwrap_err().kind(),
        ErrorKind::TableNotFound
    );
    assert_eq!(
        store.versions(TRADES_TABLE).await.unwrap_err().kind(),
        ErrorKind::TableNotFound
    );

    MergeEngine::new(store.clone(), TRADES_TABLE, MergeConfig::default())
        .upsert(&trade_batch(vec![trade_row("2022-01-03", "B1", "IBM", 1, 1.0)]))
        .await
        .unwrap();

    assert_eq!(
        reader
            .read(TRADES_TABLE, Some(Version(7)))
            .await
            .unwrap_err()
            .kind(),
        ErrorKind::VersionNotFound
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn commits_leave_no_temporary_files_behind() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    let engine = MergeEngine::new(
        FilesystemStore::new(dir.path()),
        TRADES_TABLE,
        MergeConfig::default(),
    );

    for quantity in 1..=3 {
        engine
            .upsert(&trade_batch(vec![trade_row("2022-01-03", "B1", "IBM", quantity, 1.0)]))
            .await
            .unwrap();
    }

    let table_dir = dir.path().join(TRADES_TABLE);
    let mut log_files = std::fs::read_dir(table_dir.join("_log"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect::<Vec<_>>();
    log_files.sort();
    assert_eq!(
        log_files,
        vec![
            "00000000000000000000.json",
            "00000000000000000001.json",
            "00000000000000000002.json",
        ]
    );

    let data_files = std::fs::read_dir(table_dir.join("data"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(data_files.len(), 3);
    assert!(data_files.iter().all(|name| !name.starts_with('.')));
}
