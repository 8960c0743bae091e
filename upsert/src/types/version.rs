use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::keying::KeySpec;
use crate::types::TableSchema;

/// Monotonically increasing identifier of a committed table version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(pub u64);

impl Version {
    /// The version created when a table is bootstrapped.
    pub const INITIAL: Version = Version(0);

    pub fn next(self) -> Version {
        Version(self.0 + 1)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of commit that produced a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Full insert that created the table.
    Bootstrap,
    /// Reconciliation of a source batch against the previous version.
    Merge,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Bootstrap => f.write_str("bootstrap"),
            Operation::Merge => f.write_str("merge"),
        }
    }
}

/// Row counts recorded with every committed version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OperationMetrics {
    /// Rows in the source batch.
    pub num_source_rows: u64,
    /// Rows of the previous version that were scanned.
    pub num_target_rows: u64,
    pub num_inserted_rows: u64,
    pub num_updated_rows: u64,
    pub num_deleted_rows: u64,
    /// Rows carried forward unchanged.
    pub num_copied_rows: u64,
    /// Rows in the new version.
    pub num_output_rows: u64,
    pub execution_time_ms: u64,
}

impl OperationMetrics {
    /// Returns `true` when the commit neither inserted, updated nor deleted a row.
    pub fn is_noop(&self) -> bool {
        self.num_inserted_rows == 0 && self.num_updated_rows == 0 && self.num_deleted_rows == 0
    }
}

/// Log record describing one committed version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub version: Version,
    /// Version this one was computed from, `None` for a bootstrap.
    pub parent: Option<Version>,
    /// Commit wall-clock time, also the `last_updated` of every row written by the commit.
    pub timestamp: DateTime<Utc>,
    pub operation: Operation,
    pub metrics: OperationMetrics,
    pub schema: TableSchema,
    pub key_spec: KeySpec,
}
