//! Orchestration services: liveness checks, prompt rendering and the
//! scheduler.

mod liveness;
mod prompt;
mod scheduler;
mod session_gate;

pub use liveness::{ClaimStatus, Liveness, LivenessOracle};
pub use prompt::{AgentPromptRenderer, PromptRenderError};
pub use scheduler::{
    OrchestrationError, OrchestrationResult, ParallelOrchestrator, TaskSpawnError, branch_name,
};
pub use session_gate::SessionGate;
