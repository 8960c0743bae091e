//! Change-data upsert into versioned tables.
//!
//! A table is an append-only sequence of immutable versions kept by a
//! [`store::VersionStore`]. Each batch of "current state" source rows is keyed with
//! [`keying::RowKeyer`], collected into a [`batch::SourceBatch`] and reconciled against the
//! latest version by [`merge::MergeEngine`]: rows missing from the source are deleted, rows
//! whose change columns differ are updated and new rows are inserted, all in one commit.
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use config::shared::{DuplicateKeyPolicy, MergeConfig};
//! use upsert::batch::SourceBatch;
//! use upsert::keying::KeySpec;
//! use upsert::merge::MergeEngine;
//! use upsert::store::MemoryStore;
//! use upsert::types::{ColumnSchema, ColumnType, TableSchema};
//!
//! # async fn example() -> upsert::error::UpsertResult<()> {
//! let schema = TableSchema::new(vec![
//!     ColumnSchema::new("book", ColumnType::String, false),
//!     ColumnSchema::new("quantity", ColumnType::I64, false),
//! ]);
//! let source = SourceBatch::from_rows(
//!     schema,
//!     KeySpec::new(["book"], ["quantity"]),
//!     vec![],
//!     DuplicateKeyPolicy::Reject,
//!     Utc::now(),
//! )?;
//!
//! let engine = MergeEngine::new(MemoryStore::new(), "positions", MergeConfig::default());
//! let outcome = engine.upsert(&source).await?;
//! println!("{}", outcome.report);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod error;
mod failpoints;
pub mod keying;
mod macros;
pub mod merge;
pub mod metrics;
pub mod snapshot;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;

pub use failpoints::FILESYSTEM_STORE_BEFORE_LOG_ENTRY;
