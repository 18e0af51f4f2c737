//! Execution backend port: preparing, dispatching and tracking agent runs.

use crate::orchestration::domain::RunId;
use crate::task::domain::TaskId;
use crate::workflow::domain::SessionId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Result type for execution backend operations.
pub type ExecutionResult<T> = Result<T, ExecutionError>;

/// How a spawned agent is hosted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    /// Interactive terminal session.
    #[default]
    Terminal,
    /// Embedded in the daemon process.
    Embedded,
    /// Headless background run.
    Headless,
}

impl AgentMode {
    /// Returns the canonical representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Terminal => "terminal",
            Self::Embedded => "embedded",
            Self::Headless => "headless",
        }
    }
}

impl fmt::Display for AgentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answer to whether a session may spawn another agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnCapacity {
    allowed: bool,
    reason: Option<String>,
    depth: u32,
}

impl SpawnCapacity {
    /// Spawning is allowed; `depth` is the agent depth of the parent.
    #[must_use]
    pub const fn allowed(depth: u32) -> Self {
        Self {
            allowed: true,
            reason: None,
            depth,
        }
    }

    /// Spawning is refused for `reason`.
    #[must_use]
    pub fn refused(reason: impl Into<String>, depth: u32) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            depth,
        }
    }

    /// Returns `true` when spawning is allowed.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        self.allowed
    }

    /// Returns the refusal reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Returns the agent depth of the parent session.
    #[must_use]
    pub const fn depth(&self) -> u32 {
        self.depth
    }
}

/// Everything the backend needs to prepare an agent run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Session spawning the agent.
    pub parent_session_id: SessionId,
    /// Task the agent will work on.
    pub task_id: TaskId,
    /// Project owning the task, if known.
    pub project_id: Option<String>,
    /// Rendered agent prompt.
    pub prompt: String,
    /// Working directory of the isolation resource.
    pub workdir: String,
    /// Branch checked out in the working directory.
    pub branch: String,
    /// Agent provider name.
    pub provider: String,
    /// Hosting mode.
    pub mode: AgentMode,
    /// Depth of the new agent in the spawn tree.
    pub agent_depth: u32,
}

/// A prepared but not necessarily dispatched run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreparedRun {
    /// Session created for the agent.
    pub session_id: SessionId,
    /// Backend run identifier.
    pub run_id: RunId,
}

/// Registry entry for an agent process the backend is tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningAgent {
    /// Session of the agent.
    pub session_id: SessionId,
    /// Backend run identifier.
    pub run_id: RunId,
    /// When the run was dispatched.
    pub started_at: DateTime<Utc>,
}

/// Agent execution contract.
///
/// The running-agent registry is in-memory on the backend side and is lost
/// when the daemon restarts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Checks whether `parent_session_id` may spawn another agent.
    async fn can_spawn(&self, parent_session_id: SessionId) -> ExecutionResult<SpawnCapacity>;

    /// Creates a session and run record for a new agent.
    async fn prepare_run(&self, request: &RunRequest) -> ExecutionResult<PreparedRun>;

    /// Starts the prepared agent.
    async fn dispatch(&self, run: &PreparedRun) -> ExecutionResult<()>;

    /// Looks up the running-agent registry.
    ///
    /// Returns `None` when the backend is not tracking the session.
    async fn running_agent(&self, session_id: SessionId)
    -> ExecutionResult<Option<RunningAgent>>;

    /// Discards a prepared run that will never be dispatched or has failed.
    async fn abandon_run(&self, run: &PreparedRun, reason: &str) -> ExecutionResult<()>;
}

/// Errors returned by execution backends.
#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    /// Preparing the run failed.
    #[error("failed to prepare agent run: {0}")]
    PrepareFailed(String),

    /// Starting the agent failed.
    #[error("failed to dispatch agent run: {0}")]
    DispatchFailed(String),

    /// The backend does not know the run.
    #[error("unknown agent run: {0}")]
    UnknownRun(RunId),

    /// Backend infrastructure failure.
    #[error("execution backend error: {0}")]
    Backend(Arc<dyn std::error::Error + Send + Sync>),
}

impl ExecutionError {
    /// Wraps a backend infrastructure error.
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Arc::new(err))
    }
}
