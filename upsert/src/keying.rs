//! Derivation of the `key` and `change_key` fingerprints of a row.
//!
//! Both fingerprints are SHA-256 digests over a subset of the row's cells. Every cell is
//! encoded with a type tag, and variable-length values with a length prefix, so that two
//! different column tuples can never produce the same byte stream (`"ab" + "c"` and
//! `"a" + "bc"` hash differently).

use chrono::{DateTime, Datelike, Utc};
use config::shared::TableConfig;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::bail;
use crate::error::{ErrorKind, UpsertResult};
use crate::types::{Cell, FINGERPRINT_LEN, Fingerprint, KeyedRow, TableRow, TableSchema};

const TAG_BOOL: u8 = 1;
const TAG_I64: u8 = 2;
const TAG_F64: u8 = 3;
const TAG_STRING: u8 = 4;
const TAG_DATE: u8 = 5;
const TAG_TIMESTAMPTZ: u8 = 6;

/// Names of the columns the two fingerprints are computed from, in hashing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySpec {
    pub key_columns: Vec<String>,
    pub change_columns: Vec<String>,
}

impl KeySpec {
    pub fn new<K, C>(key_columns: K, change_columns: C) -> Self
    where
        K: IntoIterator,
        K::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            key_columns: key_columns.into_iter().map(Into::into).collect(),
            change_columns: change_columns.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<&TableConfig> for KeySpec {
    fn from(config: &TableConfig) -> Self {
        KeySpec::new(config.key_columns.clone(), config.change_columns.clone())
    }
}

/// A [`KeySpec`] resolved against a schema.
#[derive(Debug, Clone)]
pub struct RowKeyer {
    spec: KeySpec,
    num_columns: usize,
    key_indices: Vec<usize>,
    change_indices: Vec<usize>,
}

impl RowKeyer {
    /// Resolves the column names of `spec` to positions in `schema`.
    ///
    /// Fails with [`ErrorKind::SchemaError`] when a column is missing, when a list is
    /// empty, or when a column appears in both lists.
    pub fn new(schema: &TableSchema, spec: KeySpec) -> UpsertResult<Self> {
        if spec.key_columns.is_empty() || spec.change_columns.is_empty() {
            bail!(
                ErrorKind::SchemaError,
                "Key spec needs at least one key column and one change column"
            );
        }

        if let Some(column) = spec
            .key_columns
            .iter()
            .find(|column| spec.change_columns.contains(column))
        {
            bail!(
                ErrorKind::SchemaError,
                "Column used both as key and as change column",
                format!("column `{column}`")
            );
        }

        let key_indices = resolve_columns(schema, &spec.key_columns)?;
        let change_indices = resolve_columns(schema, &spec.change_columns)?;

        Ok(Self {
            spec,
            num_columns: schema.len(),
            key_indices,
            change_indices,
        })
    }

    pub fn spec(&self) -> &KeySpec {
        &self.spec
    }

    /// Positions of the change columns, the ones a merge copies from source to target.
    pub fn change_indices(&self) -> &[usize] {
        &self.change_indices
    }

    pub fn key(&self, row: &TableRow) -> UpsertResult<Fingerprint> {
        fingerprint(row, &self.key_indices, &self.spec.key_columns)
    }

    pub fn change_key(&self, row: &TableRow) -> UpsertResult<Fingerprint> {
        fingerprint(row, &self.change_indices, &self.spec.change_columns)
    }

    /// Computes both fingerprints and attaches them to `row`.
    pub fn key_row(&self, row: TableRow, last_updated: DateTime<Utc>) -> UpsertResult<KeyedRow> {
        if row.values().len() != self.num_columns {
            bail!(
                ErrorKind::SchemaError,
                "Row does not match the table schema",
                format!(
                    "expected {} values, got {}",
                    self.num_columns,
                    row.values().len()
                )
            );
        }

        let key = self.key(&row)?;
        let change_key = self.change_key(&row)?;

        Ok(KeyedRow::new(key, change_key, last_updated, row))
    }

    pub fn key_rows(
        &self,
        rows: Vec<TableRow>,
        last_updated: DateTime<Utc>,
    ) -> UpsertResult<Vec<KeyedRow>> {
        rows.into_iter()
            .map(|row| self.key_row(row, last_updated))
            .collect()
    }
}

fn resolve_columns(schema: &TableSchema, columns: &[String]) -> UpsertResult<Vec<usize>> {
    columns
        .iter()
        .map(|column| match schema.column_index(column) {
            Some(index) => Ok(index),
            None => Err(crate::upsert_error!(
                ErrorKind::SchemaError,
                "Required column is missing from the schema",
                format!("column `{column}` not found in [{schema}]")
            )),
        })
        .collect()
}

fn fingerprint(row: &TableRow, indices: &[usize], names: &[String]) -> UpsertResult<Fingerprint> {
    let mut hasher = Sha256::new();
    hasher.update((indices.len() as u64).to_le_bytes());

    for (index, name) in indices.iter().zip(names) {
        match row.get(*index) {
            None => bail!(
                ErrorKind::SchemaError,
                "Required column is missing from the row",
                format!("column `{name}`")
            ),
            Some(Cell::Null) => bail!(
                ErrorKind::SchemaError,
                "Required column is null",
                format!("column `{name}`")
            ),
            Some(cell) => encode_cell(&mut hasher, cell),
        }
    }

    let digest: [u8; FINGERPRINT_LEN] = hasher.finalize().into();

    Ok(Fingerprint::from_bytes(digest))
}

fn encode_cell(hasher: &mut Sha256, cell: &Cell) {
    match cell {
        // Rejected by the caller.
        Cell::Null => {}
        Cell::Bool(value) => {
            hasher.update([TAG_BOOL, u8::from(*value)]);
        }
        Cell::I64(value) => {
            hasher.update([TAG_I64]);
            hasher.update(value.to_le_bytes());
        }
        Cell::F64(value) => {
            // -0.0 and 0.0 compare equal and must hash equal.
            let value = if *value == 0.0 { 0.0 } else { *value };
            hasher.update([TAG_F64]);
            hasher.update(value.to_bits().to_le_bytes());
        }
        Cell::String(value) => {
            hasher.update([TAG_STRING]);
            hasher.update((value.len() as u64).to_le_bytes());
            hasher.update(value.as_bytes());
        }
        Cell::Date(value) => {
            hasher.update([TAG_DATE]);
            hasher.update(value.num_days_from_ce().to_le_bytes());
        }
        Cell::TimestampTz(value) => {
            hasher.update([TAG_TIMESTAMPTZ]);
            hasher.update(value.timestamp_micros().to_le_bytes());
        }
    }
}
