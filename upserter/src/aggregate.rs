//! Per-group position summaries derived from the latest table version.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, anyhow};
use config::shared::AggregateConfig;
use tracing::info;
use upsert::snapshot::TableSnapshot;
use upsert::types::{Cell, ColumnType};

/// Totals of one group.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    /// Values of the group-by columns.
    pub group: Vec<Cell>,
    /// Sum of the non-null quantities.
    pub total_quantity: Cell,
    /// Quantity weighted average price, null when the group's quantities sum to zero.
    pub average: Option<f64>,
}

#[derive(Debug, Default)]
struct Accumulator {
    quantity_i64: i64,
    quantity_f64: f64,
    notional: f64,
}

/// Groups the rows of `snapshot` and sums their quantity and notional.
///
/// Groups are returned in order of first appearance. Rows with a null quantity do not
/// count. A null price adds nothing to the notional but its quantity still counts towards
/// the divisor of the average.
pub fn aggregate(
    snapshot: &TableSnapshot,
    config: &AggregateConfig,
) -> anyhow::Result<Vec<AggregateRow>> {
    let schema = snapshot.schema();
    let column = |name: &str| {
        schema
            .column_index(name)
            .ok_or_else(|| anyhow!("aggregate column `{name}` is not in the table [{schema}]"))
    };

    let group_indices = config
        .group_by
        .iter()
        .map(|name| column(name))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let quantity_index = column(&config.quantity_column)?;
    let price_index = column(&config.price_column)?;
    let integral_quantity = schema.columns()[quantity_index].typ == ColumnType::I64;

    let mut positions: HashMap<Vec<String>, usize> = HashMap::new();
    let mut groups: Vec<(Vec<Cell>, Accumulator)> = Vec::new();

    for keyed in snapshot.rows() {
        let row = &keyed.row;
        let group: Vec<Cell> = group_indices
            .iter()
            .map(|index| row.get(*index).cloned().unwrap_or(Cell::Null))
            .collect();
        let group_key: Vec<String> = group.iter().map(Cell::to_string).collect();

        let position = *positions.entry(group_key).or_insert_with(|| {
            groups.push((group, Accumulator::default()));
            groups.len() - 1
        });
        let accumulator = &mut groups[position].1;

        let Some(quantity_cell) = row.get(quantity_index).filter(|cell| !cell.is_null()) else {
            continue;
        };
        let quantity = quantity_cell.as_f64().ok_or_else(|| {
            anyhow!(
                "column `{}` holds non-numeric value `{quantity_cell}`",
                config.quantity_column
            )
        })?;
        if let Cell::I64(value) = quantity_cell {
            accumulator.quantity_i64 = accumulator
                .quantity_i64
                .checked_add(*value)
                .ok_or_else(|| anyhow!("total quantity overflows a 64-bit integer"))?;
        }
        accumulator.quantity_f64 += quantity;

        if let Some(price) = row.get(price_index).and_then(Cell::as_f64) {
            accumulator.notional += price * quantity;
        }
    }

    let rows = groups
        .into_iter()
        .map(|(group, accumulator)| AggregateRow {
            group,
            total_quantity: if integral_quantity {
                Cell::I64(accumulator.quantity_i64)
            } else {
                Cell::F64(accumulator.quantity_f64)
            },
            average: (accumulator.quantity_f64 != 0.0)
                .then(|| accumulator.notional / accumulator.quantity_f64),
        })
        .collect();

    Ok(rows)
}

/// Writes the aggregate rows as CSV, replacing any previous file at `path`.
pub fn write_aggregates(
    path: &Path,
    config: &AggregateConfig,
    rows: &[AggregateRow],
) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create aggregate file {}", path.display()))?;

    let mut header: Vec<&str> = config.group_by.iter().map(String::as_str).collect();
    header.extend(["total_quantity", "average"]);
    writer.write_record(&header)?;

    for row in rows {
        let mut record: Vec<String> = row.group.iter().map(Cell::to_string).collect();
        record.push(row.total_quantity.to_string());
        record.push(row.average.map(|average| average.to_string()).unwrap_or_default());
        writer.write_record(&record)?;
    }
    writer.flush()?;

    info!(path = %path.display(), groups = rows.len(), "wrote aggregate file");

    Ok(())
}
