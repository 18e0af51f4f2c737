//! Port contracts for workflow state persistence.

pub mod repository;

pub use repository::{WorkflowStateError, WorkflowStateRepository, WorkflowStateResult};
