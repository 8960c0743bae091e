//! Metrics emitted by the merge engine through the `metrics` facade.

/// Label for the table name in metrics.
pub const TABLE_NAME_LABEL: &str = "table_name";

/// Label for the commit operation (`bootstrap` or `merge`).
pub const OPERATION_LABEL: &str = "operation";

// Commit metrics

/// Counter for committed versions.
pub const UPSERT_COMMITS_TOTAL: &str = "upsert_commits_total";

/// Counter for commits lost to a concurrent writer.
pub const UPSERT_COMMIT_CONFLICTS_TOTAL: &str = "upsert_commit_conflicts_total";

/// Histogram of the time spent computing and committing a version, in seconds.
pub const UPSERT_COMMIT_DURATION_SECONDS: &str = "upsert_commit_duration_seconds";

// Row metrics

pub const UPSERT_ROWS_INSERTED_TOTAL: &str = "upsert_rows_inserted_total";

pub const UPSERT_ROWS_UPDATED_TOTAL: &str = "upsert_rows_updated_total";

pub const UPSERT_ROWS_DELETED_TOTAL: &str = "upsert_rows_deleted_total";
