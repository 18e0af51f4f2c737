//! In-memory collaborators for tests and embedding.

mod execution;
mod isolation;

pub use execution::{DEFAULT_MAX_AGENT_DEPTH, FailurePoint, InMemoryExecutionBackend, RunPhase};
pub use isolation::InMemoryIsolationProvider;
