use std::fmt;

use crate::types::{Operation, VersionEntry};

const BANNER_WIDTH: usize = 80;

/// Human readable summary of one commit.
///
/// A merge renders its delete pass framed by `-` banners followed by its insert and update
/// pass framed by `+` banners. A bootstrap is framed by `=` banners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationReport {
    text: String,
}

impl OperationReport {
    pub fn new(table: &str, entry: &VersionEntry) -> Self {
        let metrics = &entry.metrics;
        let mut text = String::new();

        match entry.operation {
            Operation::Bootstrap => {
                push_section(
                    &mut text,
                    '=',
                    &format!(
                        "bootstrap: table={table} version={} inserted={} output_rows={}",
                        entry.version, metrics.num_inserted_rows, metrics.num_output_rows
                    ),
                );
            }
            Operation::Merge => {
                push_section(
                    &mut text,
                    '-',
                    &format!(
                        "delete pass: table={table} version={} target_rows={} deleted={}",
                        entry.version, metrics.num_target_rows, metrics.num_deleted_rows
                    ),
                );
                push_section(
                    &mut text,
                    '+',
                    &format!(
                        "upsert pass: table={table} version={} source_rows={} inserted={} updated={} unchanged={} output_rows={}",
                        entry.version,
                        metrics.num_source_rows,
                        metrics.num_inserted_rows,
                        metrics.num_updated_rows,
                        metrics.num_copied_rows,
                        metrics.num_output_rows
                    ),
                );
            }
        }

        Self { text }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

fn push_section(text: &mut String, banner: char, line: &str) {
    let banner: String = std::iter::repeat_n(banner, BANNER_WIDTH).collect();

    for part in [banner.as_str(), line, banner.as_str()] {
        text.push_str(part);
        text.push('\n');
    }
}

impl fmt::Display for OperationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
