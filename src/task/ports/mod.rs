//! Port contracts for reading the task tree.
//!
//! Ports define infrastructure-agnostic interfaces used by task services.

pub mod store;

pub use store::{TaskQuery, TaskStore, TaskStoreError, TaskStoreResult};
