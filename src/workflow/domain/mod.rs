//! Domain model for workflow state.

mod ids;
mod state;

pub use ids::SessionId;
pub use state::{PersistedWorkflowData, WorkflowState};
