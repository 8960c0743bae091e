//! Source batches: the keyed "current state" rows handed to the merge engine.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use chrono::{DateTime, Utc};
use config::shared::DuplicateKeyPolicy;
use tracing::debug;

use crate::bail;
use crate::error::{ErrorKind, UpsertResult};
use crate::keying::{KeySpec, RowKeyer};
use crate::types::{KeyedRow, TableRow, TableSchema};

/// Ordered rows with unique keys, together with the schema and key spec they were keyed with.
#[derive(Debug, Clone)]
pub struct SourceBatch {
    schema: TableSchema,
    key_spec: KeySpec,
    rows: Vec<KeyedRow>,
    num_collapsed_rows: usize,
}

impl SourceBatch {
    /// Builds a batch from already keyed rows, enforcing key uniqueness.
    ///
    /// A row repeating an earlier key with the same content is dropped. A row repeating a key
    /// with different content fails with [`ErrorKind::KeyCollision`] under
    /// [`DuplicateKeyPolicy::Reject`] and replaces the earlier row in place under
    /// [`DuplicateKeyPolicy::LastWriteWins`].
    pub fn new(
        schema: TableSchema,
        key_spec: KeySpec,
        rows: Vec<KeyedRow>,
        policy: DuplicateKeyPolicy,
    ) -> UpsertResult<Self> {
        let num_input_rows = rows.len();
        let mut positions = HashMap::with_capacity(rows.len());
        let mut unique: Vec<KeyedRow> = Vec::with_capacity(rows.len());

        for row in rows {
            match positions.entry(row.key) {
                Entry::Vacant(entry) => {
                    entry.insert(unique.len());
                    unique.push(row);
                }
                Entry::Occupied(entry) => {
                    let existing = &mut unique[*entry.get()];
                    if existing.same_content(&row) {
                        continue;
                    }

                    match policy {
                        DuplicateKeyPolicy::Reject => bail!(
                            ErrorKind::KeyCollision,
                            "Source batch contains conflicting rows for the same key",
                            format!("key {} ({:?} vs {:?})", row.key, existing.row, row.row)
                        ),
                        DuplicateKeyPolicy::LastWriteWins => *existing = row,
                    }
                }
            }
        }

        let num_collapsed_rows = num_input_rows - unique.len();
        if num_collapsed_rows > 0 {
            debug!(
                collapsed = num_collapsed_rows,
                ?policy,
                "collapsed repeated keys in source batch"
            );
        }

        Ok(Self {
            schema,
            key_spec,
            rows: unique,
            num_collapsed_rows,
        })
    }

    /// Keys raw rows with `key_spec` and builds a batch from them.
    ///
    /// `loaded_at` becomes the provisional `last_updated` of every row; the merge replaces
    /// it with the commit time for rows it inserts or updates.
    pub fn from_rows(
        schema: TableSchema,
        key_spec: KeySpec,
        rows: Vec<TableRow>,
        policy: DuplicateKeyPolicy,
        loaded_at: DateTime<Utc>,
    ) -> UpsertResult<Self> {
        let keyer = RowKeyer::new(&schema, key_spec)?;
        let keyed = keyer.key_rows(rows, loaded_at)?;
        let key_spec = keyer.spec().clone();

        Self::new(schema, key_spec, keyed, policy)
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn key_spec(&self) -> &KeySpec {
        &self.key_spec
    }

    pub fn rows(&self) -> &[KeyedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of input rows dropped or replaced because their key repeated.
    pub fn num_collapsed_rows(&self) -> usize {
        self.num_collapsed_rows
    }
}
