//! Version log storage.
//!
//! A [`VersionStore`] keeps, per table, the append-only list of committed versions
//! together with the rows of each version.

mod base;
pub mod filesystem;
mod history;
pub mod memory;

pub use base::{PendingVersion, VersionStore};
pub use filesystem::FilesystemStore;
pub use history::{History, HistoryEntry};
pub use memory::MemoryStore;
