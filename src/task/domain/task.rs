//! Task read model shared with the external task store.

use super::{TaskDomainError, TaskId, TaskStatus, TaskType};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Default priority assigned to new tasks. Lower values are more urgent.
pub const DEFAULT_PRIORITY: u8 = 2;

/// A unit of work in the dependency-ordered task tree.
///
/// Tasks are created and mutated by the task store; the orchestrator only
/// reads them. The mutation helpers on this type exist so that store
/// adapters and tests can model the store's behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    title: String,
    description: Option<String>,
    project_id: Option<String>,
    status: TaskStatus,
    task_type: TaskType,
    priority: u8,
    parent_task_id: Option<TaskId>,
    blocked_by: BTreeSet<TaskId>,
    created_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
    closed_reason: Option<String>,
    closed_commit_sha: Option<String>,
}

/// Parameter object for reconstructing a persisted task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Persisted title.
    pub title: String,
    /// Persisted description, if any.
    pub description: Option<String>,
    /// Owning project, if any.
    pub project_id: Option<String>,
    /// Persisted status.
    pub status: TaskStatus,
    /// Persisted task type.
    pub task_type: TaskType,
    /// Persisted priority.
    pub priority: u8,
    /// Parent task, if any.
    pub parent_task_id: Option<TaskId>,
    /// Tasks that must be closed before this one is ready.
    pub blocked_by: BTreeSet<TaskId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Close timestamp, if closed.
    pub closed_at: Option<DateTime<Utc>>,
    /// Close reason, if closed.
    pub closed_reason: Option<String>,
    /// Commit that closed the task, if any.
    pub closed_commit_sha: Option<String>,
}

impl Task {
    /// Creates an open task with default type and priority.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyTitle`] when the title is blank.
    pub fn new(
        id: TaskId,
        title: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<Self, TaskDomainError> {
        let raw_title = title.into();
        let trimmed = raw_title.trim();
        if trimmed.is_empty() {
            return Err(TaskDomainError::EmptyTitle);
        }

        Ok(Self {
            id,
            title: trimmed.to_owned(),
            description: None,
            project_id: None,
            status: TaskStatus::Open,
            task_type: TaskType::Task,
            priority: DEFAULT_PRIORITY,
            parent_task_id: None,
            blocked_by: BTreeSet::new(),
            created_at: clock.utc(),
            closed_at: None,
            closed_reason: None,
            closed_commit_sha: None,
        })
    }

    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            title: data.title,
            description: data.description,
            project_id: data.project_id,
            status: data.status,
            task_type: data.task_type,
            priority: data.priority,
            parent_task_id: data.parent_task_id,
            blocked_by: data.blocked_by,
            created_at: data.created_at,
            closed_at: data.closed_at,
            closed_reason: data.closed_reason,
            closed_commit_sha: data.closed_commit_sha,
        }
    }

    /// Sets the parent task.
    #[must_use]
    pub fn with_parent(mut self, parent: TaskId) -> Self {
        self.parent_task_id = Some(parent);
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the task type.
    #[must_use]
    pub const fn with_task_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the owning project.
    #[must_use]
    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Adds a blocking dependency.
    #[must_use]
    pub fn blocked_by(mut self, blocker: TaskId) -> Self {
        self.blocked_by.insert(blocker);
        self
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> &TaskId {
        &self.id
    }

    /// Returns the title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the owning project, if any.
    #[must_use]
    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    /// Returns the status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns the task type.
    #[must_use]
    pub const fn task_type(&self) -> TaskType {
        self.task_type
    }

    /// Returns the priority.
    #[must_use]
    pub const fn priority(&self) -> u8 {
        self.priority
    }

    /// Returns the parent task, if any.
    #[must_use]
    pub const fn parent_task_id(&self) -> Option<&TaskId> {
        self.parent_task_id.as_ref()
    }

    /// Returns the blocking dependencies.
    #[must_use]
    pub const fn blockers(&self) -> &BTreeSet<TaskId> {
        &self.blocked_by
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the close timestamp, if closed.
    #[must_use]
    pub const fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    /// Returns the close reason, if any.
    #[must_use]
    pub fn closed_reason(&self) -> Option<&str> {
        self.closed_reason.as_deref()
    }

    /// Returns the commit that closed the task, if any.
    #[must_use]
    pub fn closed_commit_sha(&self) -> Option<&str> {
        self.closed_commit_sha.as_deref()
    }

    /// Marks the task as picked up by an agent.
    pub const fn start(&mut self) {
        self.status = TaskStatus::InProgress;
    }

    /// Moves the task to review.
    pub const fn submit_for_review(&mut self) {
        self.status = TaskStatus::Review;
    }

    /// Closes the task, recording why and by which commit.
    pub fn close(
        &mut self,
        reason: Option<String>,
        commit_sha: Option<String>,
        clock: &impl Clock,
    ) {
        self.status = TaskStatus::Closed;
        self.closed_at = Some(clock.utc());
        self.closed_reason = reason;
        self.closed_commit_sha = commit_sha;
    }

    /// Reopens the task, clearing close metadata.
    pub fn reopen(&mut self) {
        self.status = TaskStatus::Open;
        self.closed_at = None;
        self.closed_reason = None;
        self.closed_commit_sha = None;
    }
}
