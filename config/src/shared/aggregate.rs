use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Summary written from the latest table version after every run.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct AggregateConfig {
    /// Output file, overwritten on every run.
    pub output_path: PathBuf,
    #[serde(default = "default_group_by")]
    pub group_by: Vec<String>,
    #[serde(default = "default_quantity_column")]
    pub quantity_column: String,
    #[serde(default = "default_price_column")]
    pub price_column: String,
}

impl AggregateConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.group_by.is_empty() {
            return Err(ValidationError::EmptyList("aggregate.group_by".to_string()));
        }

        Ok(())
    }
}

fn default_group_by() -> Vec<String> {
    vec!["trade_date".to_string(), "security".to_string()]
}

fn default_quantity_column() -> String {
    "quantity".to_string()
}

fn default_price_column() -> String {
    "price".to_string()
}
