//! Agent assignments and their lifecycle status.

use super::IsolationResourceId;
use crate::task::domain::{Task, TaskId};
use crate::workflow::domain::SessionId;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// One spawned agent working one task in one isolation resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentAssignment {
    /// Session of the spawned agent.
    pub session_id: SessionId,
    /// Task the agent works on.
    pub task_id: TaskId,
    /// Isolation resource the agent works in.
    pub isolation_resource_id: IsolationResourceId,
    /// When the agent was spawned.
    pub started_at: DateTime<Utc>,
}

impl AgentAssignment {
    /// Creates an assignment stamped with the current time.
    #[must_use]
    pub fn new(
        session_id: SessionId,
        task_id: TaskId,
        isolation_resource_id: IsolationResourceId,
        clock: &impl Clock,
    ) -> Self {
        Self {
            session_id,
            task_id,
            isolation_resource_id,
            started_at: clock.utc(),
        }
    }
}

/// Details captured when an assigned task is observed closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionOutcome {
    /// When the orchestrator observed the completion.
    pub completed_at: DateTime<Utc>,
    /// Close timestamp reported by the task store.
    pub closed_at: Option<DateTime<Utc>>,
    /// Close reason reported by the task store.
    pub closed_reason: Option<String>,
    /// Commit that closed the task.
    pub commit_sha: Option<String>,
}

impl CompletionOutcome {
    /// Captures the close details of `task`.
    #[must_use]
    pub fn from_task(task: &Task, clock: &impl Clock) -> Self {
        Self {
            completed_at: clock.utc(),
            closed_at: task.closed_at(),
            closed_reason: task.closed_reason().map(str::to_owned),
            commit_sha: task.closed_commit_sha().map(str::to_owned),
        }
    }
}

/// Details captured when an agent is judged to have crashed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// When the failure was detected.
    pub failed_at: DateTime<Utc>,
    /// Human-readable failure reason.
    pub reason: String,
}

impl FailureRecord {
    /// Creates a failure record stamped with the current time.
    #[must_use]
    pub fn new(reason: impl Into<String>, clock: &impl Clock) -> Self {
        Self {
            failed_at: clock.utc(),
            reason: reason.into(),
        }
    }
}

/// Lifecycle status of an assignment.
///
/// `Spawned` may move to `Completed` or `Failed`; both are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AssignmentStatus {
    /// The agent is believed to be working.
    Spawned,
    /// The task was observed closed.
    Completed(CompletionOutcome),
    /// The agent exited without closing the task.
    Failed(FailureRecord),
}

impl AssignmentStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Spawned => "spawned",
            Self::Completed(_) => "completed",
            Self::Failed(_) => "failed",
        }
    }

    /// Returns `true` for completed and failed assignments.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Spawned)
    }
}

/// An assignment together with its current status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedAssignment {
    assignment: AgentAssignment,
    status: AssignmentStatus,
}

impl TrackedAssignment {
    /// Pairs an assignment with a status.
    #[must_use]
    pub const fn new(assignment: AgentAssignment, status: AssignmentStatus) -> Self {
        Self { assignment, status }
    }

    /// Returns the assignment.
    #[must_use]
    pub const fn assignment(&self) -> &AgentAssignment {
        &self.assignment
    }

    /// Returns the status.
    #[must_use]
    pub const fn status(&self) -> &AssignmentStatus {
        &self.status
    }

    /// Returns the session of the assigned agent.
    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        self.assignment.session_id
    }

    /// Returns the assigned task.
    #[must_use]
    pub const fn task_id(&self) -> &TaskId {
        &self.assignment.task_id
    }

    /// Returns the completion outcome for completed assignments.
    #[must_use]
    pub const fn completion(&self) -> Option<&CompletionOutcome> {
        match &self.status {
            AssignmentStatus::Completed(outcome) => Some(outcome),
            _ => None,
        }
    }

    /// Returns the failure record for failed assignments.
    #[must_use]
    pub const fn failure(&self) -> Option<&FailureRecord> {
        match &self.status {
            AssignmentStatus::Failed(record) => Some(record),
            _ => None,
        }
    }

    pub(super) fn set_status(&mut self, status: AssignmentStatus) {
        self.status = status;
    }
}
