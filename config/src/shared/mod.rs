//! Configuration types shared by the upsert library and the upserter binary.

mod aggregate;
mod base;
mod merge;
mod source;
mod store;
mod table;
mod upserter;

pub use aggregate::AggregateConfig;
pub use base::ValidationError;
pub use merge::{DuplicateKeyPolicy, MergeConfig};
pub use source::SourceConfig;
pub use store::StoreConfig;
pub use table::TableConfig;
pub use upserter::UpserterConfig;
