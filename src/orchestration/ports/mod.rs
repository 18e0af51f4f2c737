//! Port contracts for the collaborators the orchestrator drives.
//!
//! The orchestrator never creates working copies, spawns processes or writes
//! storage itself; it goes through these traits.

pub mod execution;
pub mod isolation;
pub mod state_store;

pub use execution::{
    AgentMode, ExecutionBackend, ExecutionError, ExecutionResult, PreparedRun, RunRequest,
    RunningAgent, SpawnCapacity,
};
pub use isolation::{
    IsolationError, IsolationProvider, IsolationRequest, IsolationResource, IsolationResult,
    IsolationStatus,
};
pub use state_store::{OrchestrationStateStore, StateStoreError, StateStoreResult};

#[cfg(test)]
pub use execution::MockExecutionBackend;
#[cfg(test)]
pub use isolation::MockIsolationProvider;
