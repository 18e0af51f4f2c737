//! Parallel orchestration of agents over a task tree.
//!
//! A parent agent session drives the orchestrator with two repeated calls:
//! one spawns agents for ready tasks up to a concurrency cap, the other
//! reconciles spawned agents into completed or failed. Per-session state
//! lives inside the session's workflow state so that it survives daemon
//! restarts.
//!
//! - Assignments, state invariants and reports in [`domain`]
//! - Collaborator contracts in [`ports`]
//! - Workflow-backed state store and in-memory collaborators in
//!   [`adapters`]
//! - Liveness checks and the scheduler in [`services`]
//! - JSON tool surface in [`tools`]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod services;
pub mod tools;
pub mod versioning;

#[cfg(test)]
mod tests;
