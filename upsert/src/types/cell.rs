use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ColumnType;

/// A single typed value of a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Cell {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Date(NaiveDate),
    TimestampTz(DateTime<Utc>),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Returns the column type this value belongs to, `None` for [`Cell::Null`].
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Cell::Null => None,
            Cell::Bool(_) => Some(ColumnType::Bool),
            Cell::I64(_) => Some(ColumnType::I64),
            Cell::F64(_) => Some(ColumnType::F64),
            Cell::String(_) => Some(ColumnType::String),
            Cell::Date(_) => Some(ColumnType::Date),
            Cell::TimestampTz(_) => Some(ColumnType::TimestampTz),
        }
    }

    /// Returns the value as a float when it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::I64(value) => Some(*value as f64),
            Cell::F64(value) => Some(*value),
            _ => None,
        }
    }
}

/// Renders the value the way it would appear in a delimited file. Null renders empty.
impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Bool(value) => write!(f, "{value}"),
            Cell::I64(value) => write!(f, "{value}"),
            Cell::F64(value) => write!(f, "{value}"),
            Cell::String(value) => f.write_str(value),
            Cell::Date(value) => write!(f, "{}", value.format("%Y-%m-%d")),
            Cell::TimestampTz(value) => write!(f, "{}", value.to_rfc3339()),
        }
    }
}
