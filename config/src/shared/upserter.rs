use serde::{Deserialize, Serialize};

use crate::Config;
use crate::shared::{
    AggregateConfig, MergeConfig, SourceConfig, StoreConfig, TableConfig, ValidationError,
};

/// Complete configuration of the upserter binary.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct UpserterConfig {
    pub table: TableConfig,
    #[serde(default)]
    pub store: StoreConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    /// When absent no aggregate file is written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<AggregateConfig>,
}

impl UpserterConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.table.validate()?;
        self.store.validate()?;
        self.source.validate()?;
        self.merge.validate()?;
        if let Some(aggregate) = &self.aggregate {
            aggregate.validate()?;
        }

        Ok(())
    }
}

impl Config for UpserterConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[
        "table.key_columns",
        "table.change_columns",
        "source.date_columns",
        "aggregate.group_by",
    ];
}
