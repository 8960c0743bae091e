use fail::fail_point;

use crate::bail;
use crate::error::{ErrorKind, UpsertResult};

/// Fires after a version's data file is durable and before its log entry is published.
pub const FILESYSTEM_STORE_BEFORE_LOG_ENTRY: &str = "filesystem_store.commit.before_log_entry";

pub fn upsert_fail_point(name: &str) -> UpsertResult<()> {
    fail_point!(name, |parameter| {
        let mut error_kind = ErrorKind::IoError;
        if let Some(parameter) = parameter {
            error_kind = match parameter.as_str() {
                "io" => ErrorKind::IoError,
                "conflict" => ErrorKind::ConcurrentModification,
                _ => ErrorKind::IoError,
            }
        }

        bail!(
            error_kind,
            "An error occurred in a fail point",
            format!("The failpoint '{name}' returned an error")
        );
    });

    Ok(())
}
