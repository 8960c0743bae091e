use chrono::Utc;
use config::shared::{StoreConfig, UpserterConfig};
use tracing::{info, warn};
use upsert::batch::SourceBatch;
use upsert::keying::KeySpec;
use upsert::merge::MergeEngine;
use upsert::store::{FilesystemStore, MemoryStore, VersionStore};

use crate::Command;
use crate::aggregate::{aggregate, write_aggregates};
use crate::source::load_source;

/// Runs `command` against the store selected by the configuration.
pub async fn start_upserter_with_config(
    config: UpserterConfig,
    command: Command,
) -> anyhow::Result<()> {
    log_config(&config);

    // Static dispatch per store, at the cost of one match arm each.
    match &config.store {
        StoreConfig::Memory => {
            warn!("using the memory store, committed versions are dropped on exit");
            run_command(MemoryStore::new(), &config, command).await
        }
        StoreConfig::Filesystem { path } => {
            run_command(FilesystemStore::new(path), &config, command).await
        }
    }
}

fn log_config(config: &UpserterConfig) {
    info!(
        table = %config.table.name,
        key_columns = ?config.table.key_columns,
        change_columns = ?config.table.change_columns,
        source = %config.source.path.display(),
        store = ?config.store,
        duplicate_keys = ?config.merge.duplicate_keys,
        max_commit_retries = config.merge.max_commit_retries,
        "upserter configuration"
    );
}

async fn run_command<S>(store: S, config: &UpserterConfig, command: Command) -> anyhow::Result<()>
where
    S: VersionStore,
{
    let engine = MergeEngine::new(store, config.table.name.clone(), config.merge.clone());

    match command {
        Command::Run => upsert_source(&engine, config).await,
        Command::History { limit } => print_history(&engine, limit).await,
    }
}

/// Loads the source file, upserts it into the table and refreshes the aggregate file.
async fn upsert_source<S>(engine: &MergeEngine<S>, config: &UpserterConfig) -> anyhow::Result<()>
where
    S: VersionStore,
{
    let loaded_at = Utc::now();
    let mut data = load_source(&config.source)?;

    let reader = engine.snapshot_reader();
    if let Some(latest) = reader.try_read_latest(engine.table()).await? {
        data = data.conform_to(latest.schema())?;
    }

    let source = SourceBatch::from_rows(
        data.schema,
        KeySpec::from(&config.table),
        data.rows,
        config.merge.duplicate_keys,
        loaded_at,
    )?;
    if source.num_collapsed_rows() > 0 {
        info!(
            collapsed = source.num_collapsed_rows(),
            "dropped repeated rows from the source"
        );
    }

    let outcome = engine.upsert(&source).await?;
    print!("{}", outcome.report);

    if let Some(aggregate_config) = &config.aggregate {
        let rows = aggregate(&outcome.snapshot, aggregate_config)?;
        write_aggregates(&aggregate_config.output_path, aggregate_config, &rows)?;
    }

    Ok(())
}

async fn print_history<S>(engine: &MergeEngine<S>, limit: usize) -> anyhow::Result<()>
where
    S: VersionStore,
{
    let history = engine.history(limit).await?;

    for entry in history.entries().await? {
        let metrics = entry.metrics;
        println!(
            "version={} timestamp={} operation={} source_rows={} inserted={} updated={} deleted={} output_rows={} execution_time_ms={}",
            entry.version,
            entry.timestamp.to_rfc3339(),
            entry.operation,
            metrics.num_source_rows,
            metrics.num_inserted_rows,
            metrics.num_updated_rows,
            metrics.num_deleted_rows,
            metrics.num_output_rows,
            metrics.execution_time_ms
        );
    }

    Ok(())
}
