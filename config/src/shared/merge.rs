use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// How a source batch that repeats a row key is handled.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKeyPolicy {
    /// Identical repeated rows are collapsed, conflicting ones fail the batch.
    #[default]
    Reject,
    /// The later row replaces the earlier one.
    LastWriteWins,
}

/// Merge engine settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct MergeConfig {
    /// Handling of repeated keys inside one source batch.
    #[serde(default)]
    pub duplicate_keys: DuplicateKeyPolicy,
    /// How many times a merge that lost a commit race is re-run against the new latest version.
    ///
    /// Zero surfaces the conflict to the caller immediately.
    #[serde(default = "default_max_commit_retries")]
    pub max_commit_retries: u32,
    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_initial_retry_delay_ms")]
    pub initial_retry_delay_ms: u64,
    /// Upper bound for the exponentially growing retry delay, in milliseconds.
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
}

impl MergeConfig {
    pub const DEFAULT_MAX_COMMIT_RETRIES: u32 = 3;
    pub const DEFAULT_INITIAL_RETRY_DELAY_MS: u64 = 100;
    pub const DEFAULT_MAX_RETRY_DELAY_MS: u64 = 5_000;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.initial_retry_delay_ms > self.max_retry_delay_ms {
            return Err(ValidationError::InvalidFieldValue {
                field: "merge.initial_retry_delay_ms".to_string(),
                constraint: "must not exceed `merge.max_retry_delay_ms`".to_string(),
            });
        }

        Ok(())
    }

    /// Returns the delay to wait before retry number `attempt` (starting at 1).
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        let delay_ms = self
            .initial_retry_delay_ms
            .saturating_mul(factor)
            .min(self.max_retry_delay_ms);

        Duration::from_millis(delay_ms)
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            duplicate_keys: DuplicateKeyPolicy::default(),
            max_commit_retries: default_max_commit_retries(),
            initial_retry_delay_ms: default_initial_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
        }
    }
}

fn default_max_commit_retries() -> u32 {
    MergeConfig::DEFAULT_MAX_COMMIT_RETRIES
}

fn default_initial_retry_delay_ms() -> u64 {
    MergeConfig::DEFAULT_INITIAL_RETRY_DELAY_MS
}

fn default_max_retry_delay_ms() -> u64 {
    MergeConfig::DEFAULT_MAX_RETRY_DELAY_MS
}
