use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Location and format of the delimited file holding the current state snapshot.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SourceConfig {
    pub path: PathBuf,
    /// Single ASCII character separating fields.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Columns whose `/` separators are rewritten to `-` while loading.
    #[serde(default = "default_date_columns")]
    pub date_columns: Vec<String>,
}

impl SourceConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.path.as_os_str().is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "source.path".to_string(),
                constraint: "must not be empty".to_string(),
            });
        }

        if self.delimiter.len() != 1 || !self.delimiter.is_ascii() {
            return Err(ValidationError::InvalidFieldValue {
                field: "source.delimiter".to_string(),
                constraint: "must be a single ASCII character".to_string(),
            });
        }

        Ok(())
    }

    /// Returns the delimiter as a byte. Only meaningful after [`SourceConfig::validate`].
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter.as_bytes().first().copied().unwrap_or(b',')
    }
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_date_columns() -> Vec<String> {
    vec!["trade_date".to_string()]
}
