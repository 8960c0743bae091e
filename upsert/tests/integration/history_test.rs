use config::shared::MergeConfig;
use futures::StreamExt;
use telemetry::init_test_tracing;
use upsert::error::ErrorKind;
use upsert::merge::MergeEngine;
use upsert::store::{History, MemoryStore};
use upsert::test_utils::rows::{TRADES_TABLE, trade_batch, trade_row};
use upsert::types::{Operation, Version};

async fn engine_with_versions(count: i64) -> MergeEngine<MemoryStore> {
    let engine = MergeEngine::new(MemoryStore::new(), TRADES_TABLE, MergeConfig::default());
    for quantity in 0..count {
        engine
            .upsert(&trade_batch(vec![trade_row("2022-01-03", "B1", "IBM", quantity, 1.0)]))
            .await
            .unwrap();
    }

    engine
}

#[tokio::test(flavor = "multi_thread")]
async fn history_lists_newest_versions_first() {
    init_test_tracing();
    let engine = engine_with_versions(4).await;

    let history = engine.history(2).await.unwrap();
    let entries = history.entries().await.unwrap();

    assert_eq!(history.versions(), &[Version(3), Version(2)]);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].version, Version(3));
    assert_eq!(entries[0].operation, Operation::Merge);
    assert_eq!(entries[0].metrics.num_updated_rows, 1);
    assert_eq!(entries[1].version, Version(2));
}

#[tokio::test(flavor = "multi_thread")]
async fn history_is_bounded_by_the_number_of_versions() {
    init_test_tracing();
    let engine = engine_with_versions(2).await;

    let history = engine.history(10).await.unwrap();
    let entries = history.entries().await.unwrap();

    assert_eq!(history.len(), 2);
    assert_eq!(entries.last().unwrap().operation, Operation::Bootstrap);
    assert!(engine.history(0).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn history_stream_restarts_from_the_newest_version() {
    init_test_tracing();
    let engine = engine_with_versions(3).await;
    let history = History::load(engine.store().clone(), TRADES_TABLE, 3)
        .await
        .unwrap();

    {
        let mut stream = std::pin::pin!(history.stream());
        let newest = stream.next().await.unwrap().unwrap();
        assert_eq!(newest.version, Version(2));
    }

    let restarted: Vec<Version> = history
        .stream()
        .map(|entry| entry.unwrap().version)
        .collect()
        .await;
    assert_eq!(restarted, vec![Version(2), Version(1), Version(0)]);
}

#[tokio::test(flavor = "multi_thread")]
async fn history_of_missing_table_fails() {
    init_test_tracing();
    let engine = MergeEngine::new(MemoryStore::new(), TRADES_TABLE, MergeConfig::default());

    let err = engine.history(5).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TableNotFound);
}
