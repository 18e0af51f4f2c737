//! Domain model for orchestration state and reports.

mod assignment;
mod error;
mod ids;
mod report;
mod state;

pub use assignment::{
    AgentAssignment, AssignmentStatus, CompletionOutcome, FailureRecord, TrackedAssignment,
};
pub use error::OrchestrationStateError;
pub use ids::{IsolationResourceId, RunId};
pub use report::{
    CAPACITY_SKIP_REASON, CompletedAgent, EXITED_WITHOUT_COMPLETING, FailedAgent,
    OrchestrationReport, OrchestrationStatus, PollReport, RunningAgentSummary, SkippedTask,
    SpawnFailure, SpawnedAgent,
};
pub use state::OrchestrationState;
