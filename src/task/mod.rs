//! Task tree read model and readiness resolution.
//!
//! The orchestrator treats the task store as an external collaborator: it
//! reads tasks, their parent links and their blocking dependencies, and never
//! writes them. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Readiness resolution in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
