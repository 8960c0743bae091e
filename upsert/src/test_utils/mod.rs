//! Helpers shared by the unit and integration tests.

pub mod failpoints;
pub mod fault_store;
pub mod rows;
