use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Cell, Fingerprint, TableRow};

/// A row together with its derived identity and change fingerprints.
///
/// `key` identifies the row across versions, `change_key` summarizes its mutable payload
/// and `last_updated` is the commit time at which the row was inserted or last changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyedRow {
    pub key: Fingerprint,
    pub change_key: Fingerprint,
    pub last_updated: DateTime<Utc>,
    pub row: TableRow,
}

impl KeyedRow {
    pub fn new(
        key: Fingerprint,
        change_key: Fingerprint,
        last_updated: DateTime<Utc>,
        row: TableRow,
    ) -> Self {
        Self {
            key,
            change_key,
            last_updated,
            row,
        }
    }

    /// Returns `true` when both rows carry the same payload, ignoring `last_updated`.
    ///
    /// Floats compare by bit pattern as well as by value, so a `NaN` matches an identical
    /// `NaN`.
    pub fn same_content(&self, other: &KeyedRow) -> bool {
        let values = self.row.values();
        let other_values = other.row.values();

        self.key == other.key
            && self.change_key == other.change_key
            && values.len() == other_values.len()
            && values
                .iter()
                .zip(other_values)
                .all(|(value, other)| same_value(value, other))
    }
}

fn same_value(value: &Cell, other: &Cell) -> bool {
    match (value, other) {
        (Cell::F64(value), Cell::F64(other)) => value.to_bits() == other.to_bits() || value == other,
        (value, other) => value == other,
    }
}
