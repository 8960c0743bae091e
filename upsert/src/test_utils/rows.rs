use chrono::{NaiveDate, Utc};
use config::shared::DuplicateKeyPolicy;

use crate::batch::SourceBatch;
use crate::keying::KeySpec;
use crate::types::{Cell, ColumnSchema, ColumnType, TableRow, TableSchema};

pub const TRADES_TABLE: &str = "trades";

/// Schema of the trade positions used throughout the tests.
pub fn trade_schema() -> TableSchema {
    TableSchema::new(vec![
        ColumnSchema::new("trade_date", ColumnType::Date, false),
        ColumnSchema::new("book", ColumnType::String, false),
        ColumnSchema::new("security", ColumnType::String, false),
        ColumnSchema::new("quantity", ColumnType::I64, true),
        ColumnSchema::new("price", ColumnType::F64, true),
    ])
}

pub fn trade_key_spec() -> KeySpec {
    KeySpec::new(["trade_date", "book", "security"], ["quantity", "price"])
}

/// Builds a trade row, `trade_date` formatted as `YYYY-MM-DD`.
pub fn trade_row(trade_date: &str, book: &str, security: &str, quantity: i64, price: f64) -> TableRow {
    let trade_date = NaiveDate::parse_from_str(trade_date, "%Y-%m-%d").unwrap();

    TableRow::new(vec![
        Cell::Date(trade_date),
        Cell::String(book.to_string()),
        Cell::String(security.to_string()),
        Cell::I64(quantity),
        Cell::F64(price),
    ])
}

/// Keys `rows` into a batch using the trade schema and the default duplicate policy.
pub fn trade_batch(rows: Vec<TableRow>) -> SourceBatch {
    SourceBatch::from_rows(
        trade_schema(),
        trade_key_spec(),
        rows,
        DuplicateKeyPolicy::Reject,
        Utc::now(),
    )
    .unwrap()
}
