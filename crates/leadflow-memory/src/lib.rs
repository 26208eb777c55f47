//! # leadflow-memory
//!
//! SQLite-backed persistence for Leadflow.

mod store;

pub use store::Store;
