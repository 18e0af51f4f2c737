//! Adapter implementations of the orchestration ports.

pub mod memory;
pub mod workflow_state;

pub use workflow_state::WorkflowStateStore;
