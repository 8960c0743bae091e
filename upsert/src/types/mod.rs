//! Core data types of the upsert engine.
//!
//! Cells, schemas and rows model the tabular data, fingerprints and keyed rows carry the
//! derived identity and change columns, and versions describe committed table states.

mod cell;
mod fingerprint;
mod keyed_row;
mod schema;
mod table_row;
mod version;

pub use cell::*;
pub use fingerprint::*;
pub use keyed_row::*;
pub use schema::*;
pub use table_row::*;
pub use version::*;
