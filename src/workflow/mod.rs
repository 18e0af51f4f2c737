//! Generic per-session workflow state persistence.
//!
//! Every agent session that runs a workflow owns one [`domain::WorkflowState`]
//! record: the workflow name, the current step, and a JSON variables map.
//! Writers always replace the whole record; there are no field-level updates.
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - In-memory and `PostgreSQL` adapters in [`adapters`]

pub mod adapters;
pub mod domain;
pub mod ports;

#[cfg(test)]
mod tests;
