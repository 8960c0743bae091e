use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::batch::SourceBatch;
use crate::error::UpsertResult;
use crate::keying::RowKeyer;
use crate::types::{Fingerprint, KeyedRow, OperationMetrics};

/// Row operations that turn a target version into the next one.
///
/// Built by [`MergePlan::classify`] from two passes over the pre-merge target: an
/// anti-join of the target against the source keys selects the deletes, then a hash join
/// of the source against the target splits the source rows into updates, unchanged rows
/// and inserts.
#[derive(Debug, Default)]
pub struct MergePlan {
    /// Keys of target rows missing from the source.
    deletes: HashSet<Fingerprint>,
    /// Target key to the index of the source row whose change columns replace it.
    updates: HashMap<Fingerprint, usize>,
    /// Indices of source rows without a target row, in source order.
    inserts: Vec<usize>,
    num_unchanged: usize,
    num_source_rows: usize,
    num_target_rows: usize,
}

impl MergePlan {
    pub fn classify(source: &SourceBatch, target: &[KeyedRow]) -> Self {
        let source_keys: HashSet<Fingerprint> = source.rows().iter().map(|row| row.key).collect();
        let deletes = target
            .iter()
            .map(|row| row.key)
            .filter(|key| !source_keys.contains(key))
            .collect();

        let target_change_keys: HashMap<Fingerprint, Fingerprint> = target
            .iter()
            .map(|row| (row.key, row.change_key))
            .collect();

        let mut updates = HashMap::new();
        let mut inserts = Vec::new();
        let mut num_unchanged = 0;
        for (index, row) in source.rows().iter().enumerate() {
            match target_change_keys.get(&row.key) {
                Some(change_key) if *change_key == row.change_key => num_unchanged += 1,
                Some(_) => {
                    updates.insert(row.key, index);
                }
                None => inserts.push(index),
            }
        }

        Self {
            deletes,
            updates,
            inserts,
            num_unchanged,
            num_source_rows: source.len(),
            num_target_rows: target.len(),
        }
    }

    pub fn num_inserted(&self) -> usize {
        self.inserts.len()
    }

    pub fn num_updated(&self) -> usize {
        self.updates.len()
    }

    pub fn num_deleted(&self) -> usize {
        self.deletes.len()
    }

    pub fn num_unchanged(&self) -> usize {
        self.num_unchanged
    }

    /// Returns `true` when applying the plan would reproduce the target unchanged.
    pub fn is_noop(&self) -> bool {
        self.deletes.is_empty() && self.updates.is_empty() && self.inserts.is_empty()
    }

    /// Row counts of the plan. `execution_time_ms` is left at zero.
    pub fn metrics(&self) -> OperationMetrics {
        let num_output_rows = self.num_target_rows - self.deletes.len() + self.inserts.len();

        OperationMetrics {
            num_source_rows: self.num_source_rows as u64,
            num_target_rows: self.num_target_rows as u64,
            num_inserted_rows: self.inserts.len() as u64,
            num_updated_rows: self.updates.len() as u64,
            num_deleted_rows: self.deletes.len() as u64,
            num_copied_rows: self.num_unchanged as u64,
            num_output_rows: num_output_rows as u64,
            execution_time_ms: 0,
        }
    }

    /// Builds the rows of the next version.
    ///
    /// Surviving target rows keep their order, updated in place: the columns at
    /// `change_indices` and the `change_key` come from the source row and `last_updated`
    /// becomes `merged_at`. Inserted rows follow in source order.
    pub fn apply(
        &self,
        source: &SourceBatch,
        target: &[KeyedRow],
        change_indices: &[usize],
        merged_at: DateTime<Utc>,
    ) -> Vec<KeyedRow> {
        let source_rows = source.rows();
        let mut rows = Vec::with_capacity(self.num_target_rows - self.deletes.len() + self.inserts.len());

        for target_row in target {
            if self.deletes.contains(&target_row.key) {
                continue;
            }

            let mut row = target_row.clone();
            if let Some(&index) = self.updates.get(&target_row.key) {
                let source_row = &source_rows[index];
                let values = row.row.values_mut();
                for &column in change_indices {
                    if let (Some(value), Some(new_value)) =
                        (values.get_mut(column), source_row.row.get(column))
                    {
                        *value = new_value.clone();
                    }
                }
                row.change_key = source_row.change_key;
                row.last_updated = merged_at;
            }
            rows.push(row);
        }

        for &index in &self.inserts {
            let mut row = source_rows[index].clone();
            row.last_updated = merged_at;
            rows.push(row);
        }

        rows
    }
}

/// Merges `source` into the `target` rows, returning the next version's rows and the
/// operation's row counts.
pub fn merge_rows(
    source: &SourceBatch,
    target: &[KeyedRow],
    merged_at: DateTime<Utc>,
) -> UpsertResult<(Vec<KeyedRow>, OperationMetrics)> {
    let keyer = RowKeyer::new(source.schema(), source.key_spec().clone())?;
    let plan = MergePlan::classify(source, target);
    let rows = plan.apply(source, target, keyer.change_indices(), merged_at);

    Ok((rows, plan.metrics()))
}
