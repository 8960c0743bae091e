//! Reconciliation of source batches against committed table versions.

mod engine;
mod plan;
mod report;

pub use engine::{MergeEngine, MergeOutcome};
pub use plan::{MergePlan, merge_rows};
pub use report::OperationReport;
