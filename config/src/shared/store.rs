use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Where table versions are persisted.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Versions live in process memory and are lost on exit.
    #[default]
    Memory,
    /// Versions are written below `path`, one directory per table.
    Filesystem { path: PathBuf },
}

impl StoreConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let StoreConfig::Filesystem { path } = self
            && path.as_os_str().is_empty()
        {
            return Err(ValidationError::InvalidFieldValue {
                field: "store.path".to_string(),
                constraint: "must not be empty".to_string(),
            });
        }

        Ok(())
    }
}
