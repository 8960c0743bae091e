//! Loading of the CSV source file into typed rows.

use std::fs::File;
use std::io;

use anyhow::{Context, bail};
use chrono::NaiveDate;
use config::shared::SourceConfig;
use tracing::info;
use upsert::types::{Cell, ColumnSchema, ColumnType, TableRow, TableSchema};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Narrowest type that fits every non-empty value seen so far in a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Candidate {
    /// No non-empty value seen yet.
    Unknown,
    Date,
    I64,
    F64,
    String,
}

impl Candidate {
    fn widen(self, value: &str) -> Candidate {
        match self {
            Candidate::Unknown if value.parse::<i64>().is_ok() => Candidate::I64,
            Candidate::Unknown if value.parse::<f64>().is_ok() => Candidate::F64,
            Candidate::Unknown => Candidate::String,
            Candidate::Date if NaiveDate::parse_from_str(value, DATE_FORMAT).is_ok() => self,
            Candidate::Date => Candidate::String,
            Candidate::I64 if value.parse::<i64>().is_ok() => self,
            Candidate::I64 | Candidate::F64 if value.parse::<f64>().is_ok() => Candidate::F64,
            Candidate::I64 | Candidate::F64 | Candidate::String => Candidate::String,
        }
    }

    fn column_type(self) -> ColumnType {
        match self {
            Candidate::Unknown | Candidate::String => ColumnType::String,
            Candidate::Date => ColumnType::Date,
            Candidate::I64 => ColumnType::I64,
            Candidate::F64 => ColumnType::F64,
        }
    }
}

/// Rows read from the source file with the schema inferred for them.
#[derive(Debug)]
pub struct SourceData {
    pub schema: TableSchema,
    pub rows: Vec<TableRow>,
    /// Columns without a single non-empty value, typed only provisionally.
    untyped: Vec<bool>,
}

impl SourceData {
    /// Retypes the rows to the column types of an existing table.
    ///
    /// Integer columns are widened to float where the table stores floats. Columns holding
    /// only nulls take the table's type. Any other difference in column names or types is
    /// an error.
    pub fn conform_to(self, schema: &TableSchema) -> anyhow::Result<SourceData> {
        if self.schema.is_compatible_with(schema) {
            return Ok(self);
        }

        let source_columns = self.schema.columns();
        let table_columns = schema.columns();
        if source_columns.len() != table_columns.len() {
            bail!(
                "source has columns [{}] but the table has [{}]",
                self.schema,
                schema
            );
        }

        let mut widen = vec![false; table_columns.len()];
        for (index, (source, table)) in source_columns.iter().zip(table_columns).enumerate() {
            match (source.typ, table.typ) {
                _ if source.name != table.name => bail!(
                    "source column `{}` does not match table column `{}`",
                    source.name,
                    table.name
                ),
                _ if self.untyped[index] => {}
                (source_type, table_type) if source_type == table_type => {}
                (ColumnType::I64, ColumnType::F64) => widen[index] = true,
                (source_type, table_type) => bail!(
                    "source column `{}` is {source_type} but the table stores {table_type}",
                    source.name
                ),
            }
        }

        let rows = self
            .rows
            .into_iter()
            .map(|row| {
                let values = row
                    .into_values()
                    .into_iter()
                    .zip(&widen)
                    .map(|(cell, widen)| match cell {
                        Cell::I64(value) if *widen => Cell::F64(value as f64),
                        cell => cell,
                    })
                    .collect();

                TableRow::new(values)
            })
            .collect();

        Ok(SourceData {
            schema: schema.clone(),
            rows,
            untyped: vec![false; table_columns.len()],
        })
    }
}

/// Reads the configured source file.
pub fn load_source(config: &SourceConfig) -> anyhow::Result<SourceData> {
    let file = File::open(&config.path)
        .with_context(|| format!("failed to open source file {}", config.path.display()))?;
    let data = read_source(file, config)
        .with_context(|| format!("failed to read source file {}", config.path.display()))?;

    info!(
        path = %config.path.display(),
        rows = data.rows.len(),
        schema = %data.schema,
        "loaded source file"
    );

    Ok(data)
}

/// Parses delimited text with a header row.
///
/// Every column is typed as integer, float or string, the narrowest type all its
/// non-empty values parse as. Date columns have `/` replaced by `-` and are typed as dates
/// when every value is a `YYYY-MM-DD` date. Empty fields become nulls, and a column without
/// any non-empty value is typed as string until [`SourceData::conform_to`] retypes it.
pub fn read_source<R: io::Read>(reader: R, config: &SourceConfig) -> anyhow::Result<SourceData> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(config.delimiter_byte())
        .has_headers(true)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()
        .context("failed to read the header row")?
        .iter()
        .map(|header| header.trim().to_string())
        .collect();
    if headers.is_empty() || headers.iter().any(String::is_empty) {
        bail!("source header row contains an empty column name");
    }

    let is_date_column: Vec<bool> = headers
        .iter()
        .map(|header| config.date_columns.contains(header))
        .collect();

    let mut records: Vec<Vec<String>> = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("malformed record {}", line + 1))?;
        if record.len() != headers.len() {
            bail!(
                "record {} has {} fields, expected {}",
                line + 1,
                record.len(),
                headers.len()
            );
        }

        let values = record
            .iter()
            .zip(&is_date_column)
            .map(|(value, is_date)| {
                let value = value.trim();
                if *is_date {
                    value.replace('/', "-")
                } else {
                    value.to_string()
                }
            })
            .collect();
        records.push(values);
    }

    let mut candidates: Vec<Candidate> = is_date_column
        .iter()
        .map(|is_date| if *is_date { Candidate::Date } else { Candidate::Unknown })
        .collect();
    let mut nullable = vec![false; headers.len()];
    let mut untyped = vec![true; headers.len()];
    for record in &records {
        for (index, value) in record.iter().enumerate() {
            if value.is_empty() {
                nullable[index] = true;
            } else {
                candidates[index] = candidates[index].widen(value);
                untyped[index] = false;
            }
        }
    }

    let schema = TableSchema::new(
        headers
            .into_iter()
            .zip(candidates.iter().zip(&nullable))
            .map(|(name, (candidate, nullable))| {
                ColumnSchema::new(name, candidate.column_type(), *nullable)
            })
            .collect(),
    );

    let rows = records
        .into_iter()
        .map(|record| {
            let values = record
                .into_iter()
                .zip(&candidates)
                .map(|(value, candidate)| parse_cell(value, *candidate))
                .collect::<anyhow::Result<Vec<_>>>()?;

            Ok(TableRow::new(values))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(SourceData {
        schema,
        rows,
        untyped,
    })
}

fn parse_cell(value: String, candidate: Candidate) -> anyhow::Result<Cell> {
    if value.is_empty() {
        return Ok(Cell::Null);
    }

    let cell = match candidate {
        Candidate::Date => Cell::Date(
            NaiveDate::parse_from_str(&value, DATE_FORMAT)
                .with_context(|| format!("invalid date `{value}`"))?,
        ),
        Candidate::I64 => Cell::I64(
            value
                .parse()
                .with_context(|| format!("invalid integer `{value}`"))?,
        ),
        Candidate::F64 => Cell::F64(
            value
                .parse()
                .with_context(|| format!("invalid float `{value}`"))?,
        ),
        Candidate::Unknown | Candidate::String => Cell::String(value),
    };

    Ok(cell)
}
