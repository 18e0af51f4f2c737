//! Results returned by orchestration operations.

use super::IsolationResourceId;
use crate::task::domain::TaskId;
use crate::workflow::domain::SessionId;
use chrono::{DateTime, Utc};

/// Reason recorded for ready tasks left over once every slot is taken.
pub const CAPACITY_SKIP_REASON: &str = "max_concurrent limit reached";

/// Reason recorded when an agent exits while its task is still open.
pub const EXITED_WITHOUT_COMPLETING: &str = "agent exited without completing the task";

/// An agent spawned during one orchestration call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnedAgent {
    /// Task the agent works on.
    pub task_id: TaskId,
    /// Session of the new agent.
    pub session_id: SessionId,
    /// Isolation resource the agent works in.
    pub isolation_resource_id: IsolationResourceId,
    /// Branch checked out in the isolation resource.
    pub branch: String,
}

/// A ready task that was not attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedTask {
    /// Skipped task.
    pub task_id: TaskId,
    /// Why it was skipped.
    pub reason: String,
}

/// A task whose spawn attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnFailure {
    /// Task that could not be spawned.
    pub task_id: TaskId,
    /// Description of the failure.
    pub error: String,
}

/// Outcome of one `orchestrate_ready_tasks` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrchestrationReport {
    /// Agents spawned, in spawn order.
    pub spawned: Vec<SpawnedAgent>,
    /// Ready tasks not attempted.
    pub skipped: Vec<SkippedTask>,
    /// Tasks whose spawn failed.
    pub errors: Vec<SpawnFailure>,
}

impl OrchestrationReport {
    pub(crate) fn skip(&mut self, task_id: TaskId, reason: &str) {
        self.skipped.push(SkippedTask {
            task_id,
            reason: reason.to_owned(),
        });
    }
}

/// An assignment observed completed during a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedAgent {
    /// Session of the agent.
    pub session_id: SessionId,
    /// Completed task.
    pub task_id: TaskId,
    /// Commit that closed the task, if reported.
    pub commit_sha: Option<String>,
}

/// An assignment judged crashed during a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedAgent {
    /// Session of the agent.
    pub session_id: SessionId,
    /// Task left unfinished.
    pub task_id: TaskId,
    /// Failure reason.
    pub failure_reason: String,
}

/// An assignment still believed to be working.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningAgentSummary {
    /// Session of the agent.
    pub session_id: SessionId,
    /// Task being worked on.
    pub task_id: TaskId,
    /// When the agent was spawned.
    pub started_at: DateTime<Utc>,
}

/// Outcome of one `poll_agent_status` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Assignments that moved to completed during this poll.
    pub newly_completed: Vec<CompletedAgent>,
    /// Assignments that moved to failed during this poll.
    pub newly_failed: Vec<FailedAgent>,
    /// Assignments still spawned after this poll.
    pub still_running: Vec<RunningAgentSummary>,
    /// `true` when no assignment remains spawned.
    pub all_done: bool,
}

impl PollReport {
    /// Report for a session with nothing in flight.
    #[must_use]
    pub fn idle() -> Self {
        Self {
            all_done: true,
            ..Self::default()
        }
    }

    /// Returns `true` when the poll changed any assignment.
    #[must_use]
    pub fn has_transitions(&self) -> bool {
        !self.newly_completed.is_empty() || !self.newly_failed.is_empty()
    }
}

/// Read-only snapshot of a parent task's orchestration progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrchestrationStatus {
    /// Subtree tasks that are open.
    pub open: usize,
    /// Subtree tasks in progress.
    pub in_progress: usize,
    /// Subtree tasks in review.
    pub review: usize,
    /// Subtree tasks closed.
    pub closed: usize,
    /// Subtree tasks escalated.
    pub escalated: usize,
    /// Ready tasks with no spawned or completed assignment.
    pub ready_unassigned: usize,
    /// Assignments currently spawned.
    pub spawned: usize,
    /// Assignments completed.
    pub completed: usize,
    /// Assignments failed.
    pub failed: usize,
}

impl OrchestrationStatus {
    /// Returns the number of tasks in the subtree.
    #[must_use]
    pub const fn total_tasks(&self) -> usize {
        self.open + self.in_progress + self.review + self.closed + self.escalated
    }
}
