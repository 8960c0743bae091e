//! Version store persisting tables as JSON files on a local filesystem.
//!
//! Layout of a table directory:
//!
//! ```text
//! <root>/<table>/
//!     data/<uuid>.json              rows of one version, never rewritten
//!     _log/00000000000000000000.json log entry of version 0
//!     _log/00000000000000000001.json log entry of version 1
//! ```
//!
//! A version exists once its log entry exists. Data files are written first, then the log
//! entry is published by hard linking a fully written temporary file to its final name.
//! Linking fails when the name is taken, so two writers racing for the same version can
//! never both win, and readers never observe a partially written entry.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ErrorKind, UpsertError, UpsertResult};
use crate::failpoints::{FILESYSTEM_STORE_BEFORE_LOG_ENTRY, upsert_fail_point};
use crate::store::base::{PendingVersion, VersionStore};
use crate::types::{KeyedRow, Version, VersionEntry};
use crate::{bail, upsert_error};

const DATA_DIR: &str = "data";
const LOG_DIR: &str = "_log";
const JSON_EXTENSION: &str = "json";

/// Contents of a `_log/<version>.json` file.
#[derive(Debug, Serialize, Deserialize)]
struct LogRecord {
    entry: VersionEntry,
    /// Name of the data file holding the rows, relative to the `data` directory.
    data_file: String,
}

fn log_file_name(version: Version) -> String {
    format!("{:020}.{JSON_EXTENSION}", version.into_inner())
}

fn parse_log_file_name(name: &str) -> Option<Version> {
    let stem = name.strip_suffix(".json")?;
    if stem.len() != 20 || !stem.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }

    stem.parse().ok().map(Version)
}

fn serialization_error(table: &str, err: serde_json::Error) -> UpsertError {
    upsert_error!(
        ErrorKind::SerializationError,
        "Failed to serialize table version",
        format!("table `{table}`: {err}"),
        source: err
    )
}

/// Version store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FilesystemStore {
    root: PathBuf,
    /// Serializes commits to the same table within this process.
    commit_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl FilesystemStore {
    /// Creates a store rooted at `root`. The directory is created on the first commit.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            commit_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn table_dir(&self, table: &str) -> PathBuf {
        self.root.join(table)
    }

    fn log_dir(&self, table: &str) -> PathBuf {
        self.table_dir(table).join(LOG_DIR)
    }

    fn data_dir(&self, table: &str) -> PathBuf {
        self.table_dir(table).join(DATA_DIR)
    }

    async fn commit_lock(&self, table: &str) -> Arc<Mutex<()>> {
        let mut locks = self.commit_locks.lock().await;

        locks.entry(table.to_string()).or_default().clone()
    }

    /// Lists committed versions in ascending order, empty when the table does not exist.
    async fn list_versions(&self, table: &str) -> UpsertResult<Vec<Version>> {
        let mut dir = match fs::read_dir(self.log_dir(table)).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(vec![]),
            Err(err) => return Err(err.into()),
        };

        let mut versions = Vec::new();
        while let Some(dir_entry) = dir.next_entry().await? {
            // Temporary files start with a dot and never parse.
            if let Some(version) = dir_entry.file_name().to_str().and_then(parse_log_file_name) {
                versions.push(version);
            }
        }
        versions.sort_unstable();

        Ok(versions)
    }

    async fn read_log_record(&self, table: &str, version: Version) -> UpsertResult<LogRecord> {
        let path = self.log_dir(table).join(log_file_name(version));

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                if self.list_versions(table).await?.is_empty() {
                    bail!(
                        ErrorKind::TableNotFound,
                        "Table does not exist",
                        format!("table `{table}` under {}", self.root.display())
                    );
                }

                bail!(
                    ErrorKind::VersionNotFound,
                    "Table version does not exist",
                    format!("table `{table}` has no version {version}")
                );
            }
            Err(err) => return Err(err.into()),
        };

        let record: LogRecord = serde_json::from_slice(&bytes)?;
        if record.entry.version != version {
            bail!(
                ErrorKind::InvalidData,
                "Log entry does not match its file name",
                format!(
                    "{} holds version {}",
                    path.display(),
                    record.entry.version
                )
            );
        }

        Ok(record)
    }

    async fn write_data_file(&self, table: &str, rows: &[KeyedRow]) -> UpsertResult<PathBuf> {
        let data_dir = self.data_dir(table);
        fs::create_dir_all(&data_dir).await?;

        let bytes = serde_json::to_vec(rows).map_err(|err| serialization_error(table, err))?;
        let name = format!("{}.{JSON_EXTENSION}", Uuid::new_v4());
        let temp_path = data_dir.join(format!(".{name}.tmp"));
        let path = data_dir.join(&name);

        if let Err(err) = write_synced(&temp_path, &bytes).await {
            remove_quietly(&temp_path).await;
            return Err(err);
        }
        if let Err(err) = fs::rename(&temp_path, &path).await {
            remove_quietly(&temp_path).await;
            return Err(err.into());
        }
        sync_dir(&data_dir).await?;

        Ok(path)
    }

    /// Publishes the log entry of a version, failing if the entry already exists.
    async fn publish_log_record(&self, table: &str, record: &LogRecord) -> UpsertResult<()> {
        let log_dir = self.log_dir(table);
        fs::create_dir_all(&log_dir).await?;

        let version = record.entry.version;
        let bytes =
            serde_json::to_vec_pretty(record).map_err(|err| serialization_error(table, err))?;
        let temp_path = log_dir.join(format!(".{}.{}.tmp", log_file_name(version), Uuid::new_v4()));
        let path = log_dir.join(log_file_name(version));

        let result = match write_synced(&temp_path, &bytes).await {
            Ok(()) => fs::hard_link(&temp_path, &path).await.map_err(|err| {
                if err.kind() == io::ErrorKind::AlreadyExists {
                    upsert_error!(
                        ErrorKind::ConcurrentModification,
                        "Table was modified by a concurrent commit",
                        format!("table `{table}`: version {version} was published by another writer"),
                        source: err
                    )
                } else {
                    err.into()
                }
            }),
            Err(err) => Err(err),
        };
        remove_quietly(&temp_path).await;
        result?;

        sync_dir(&log_dir).await
    }
}

impl VersionStore for FilesystemStore {
    async fn latest_version(&self, table: &str) -> UpsertResult<Option<Version>> {
        Ok(self.list_versions(table).await?.last().copied())
    }

    async fn versions(&self, table: &str) -> UpsertResult<Vec<Version>> {
        let versions = self.list_versions(table).await?;
        if versions.is_empty() {
            bail!(
                ErrorKind::TableNotFound,
                "Table does not exist",
                format!("table `{table}` under {}", self.root.display())
            );
        }

        Ok(versions)
    }

    async fn entry(&self, table: &str, version: Version) -> UpsertResult<VersionEntry> {
        Ok(self.read_log_record(table, version).await?.entry)
    }

    async fn read_version(
        &self,
        table: &str,
        version: Version,
    ) -> UpsertResult<(VersionEntry, Arc<Vec<KeyedRow>>)> {
        let record = self.read_log_record(table, version).await?;
        let path = self.data_dir(table).join(&record.data_file);

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => bail!(
                ErrorKind::InvalidState,
                "Data file of a committed version is missing",
                format!("table `{table}` version {version}: {}", path.display()),
                source: err
            ),
            Err(err) => return Err(err.into()),
        };
        let rows: Vec<KeyedRow> = serde_json::from_slice(&bytes)?;

        Ok((record.entry, Arc::new(rows)))
    }

    async fn commit(&self, table: &str, pending: PendingVersion) -> UpsertResult<VersionEntry> {
        let lock = self.commit_lock(table).await;
        let _guard = lock.lock().await;

        let latest = self.list_versions(table).await?.last().copied();
        pending.check_parent(table, latest)?;

        let (entry, rows) = pending.into_parts();
        let data_path = self.write_data_file(table, &rows).await?;
        let data_file = data_path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                upsert_error!(
                    ErrorKind::InvalidState,
                    "Data file has no valid file name",
                    data_path.display()
                )
            })?;

        let record = LogRecord { entry, data_file };
        let published = match upsert_fail_point(FILESYSTEM_STORE_BEFORE_LOG_ENTRY) {
            Ok(()) => self.publish_log_record(table, &record).await,
            Err(err) => Err(err),
        };

        if let Err(err) = published {
            // The version never became visible, its data file is garbage.
            remove_quietly(&data_path).await;
            return Err(err);
        }

        debug!(
            table,
            version = %record.entry.version,
            data_file = %record.data_file,
            "committed version to filesystem store"
        );

        Ok(record.entry)
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> UpsertResult<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;

    Ok(())
}

/// Makes renames and links inside `dir` durable.
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> UpsertResult<()> {
    fs::File::open(dir).await?.sync_all().await?;

    Ok(())
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> UpsertResult<()> {
    Ok(())
}

async fn remove_quietly(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "failed to remove leftover file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_names_sort_by_version() {
        assert_eq!(log_file_name(Version(0)), "00000000000000000000.json");
        assert_eq!(log_file_name(Version(42)), "00000000000000000042.json");
        assert!(log_file_name(Version(9)) < log_file_name(Version(10)));
    }

    #[test]
    fn only_log_entries_parse() {
        assert_eq!(
            parse_log_file_name("00000000000000000042.json"),
            Some(Version(42))
        );
        assert_eq!(parse_log_file_name("42.json"), None);
        assert_eq!(
            parse_log_file_name(".00000000000000000042.json.5f0c.tmp"),
            None
        );
        assert_eq!(parse_log_file_name("0000000000000000004x.json"), None);
    }
}
