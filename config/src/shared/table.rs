use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Identifies the target table and the columns its fingerprints are derived from.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TableConfig {
    /// Name under which the table is stored.
    pub name: String,
    /// Business columns identifying a row, hashed into the row `key`.
    #[serde(default = "default_key_columns")]
    pub key_columns: Vec<String>,
    /// Mutable payload columns, hashed into the row `change_key`.
    #[serde(default = "default_change_columns")]
    pub change_columns: Vec<String>,
}

impl TableConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "table.name".to_string(),
                constraint: "must not be empty".to_string(),
            });
        }

        if self.name.contains(['/', '\\']) || self.name.starts_with('.') {
            return Err(ValidationError::InvalidFieldValue {
                field: "table.name".to_string(),
                constraint: "must not contain path separators or start with `.`".to_string(),
            });
        }

        if self.key_columns.is_empty() {
            return Err(ValidationError::EmptyList("table.key_columns".to_string()));
        }

        if self.change_columns.is_empty() {
            return Err(ValidationError::EmptyList("table.change_columns".to_string()));
        }

        if let Some(column) = self
            .key_columns
            .iter()
            .find(|column| self.change_columns.contains(column))
        {
            return Err(ValidationError::OverlappingColumn(column.clone()));
        }

        Ok(())
    }
}

fn default_key_columns() -> Vec<String> {
    vec![
        "trade_date".to_string(),
        "book".to_string(),
        "security".to_string(),
    ]
}

fn default_change_columns() -> Vec<String> {
    vec!["quantity".to_string(), "price".to_string()]
}
