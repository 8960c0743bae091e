use serde::{Deserialize, Serialize};

use crate::types::Cell;

/// Cell values of one row, ordered like the columns of its [`crate::types::TableSchema`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableRow {
    values: Vec<Cell>,
}

impl TableRow {
    pub fn new(values: Vec<Cell>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Cell] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut Vec<Cell> {
        &mut self.values
    }

    pub fn into_values(self) -> Vec<Cell> {
        self.values
    }

    /// Returns the cell at `index`, `None` when the row is shorter.
    pub fn get(&self, index: usize) -> Option<&Cell> {
        self.values.get(index)
    }
}
