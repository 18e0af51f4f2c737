//! Per-session orchestration state.

use super::{
    AgentAssignment, AssignmentStatus, CompletionOutcome, FailureRecord, OrchestrationStateError,
    TrackedAssignment,
};
use crate::task::domain::TaskId;
use crate::workflow::domain::SessionId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Assignments owned by one orchestrating session.
///
/// The state holds these invariants:
///
/// - a task is tracked by at most one assignment, whatever its status;
/// - a session appears in at most one assignment;
/// - statuses only move from spawned to completed or failed.
///
/// Deserialisation re-checks the first two, so a corrupted record surfaces as
/// an error instead of an inconsistent state.
///
/// Retrying a failed task replaces its failed assignment, so the superseded
/// session no longer appears in any view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawOrchestrationState")]
pub struct OrchestrationState {
    assignments: Vec<TrackedAssignment>,
}

#[derive(Deserialize)]
struct RawOrchestrationState {
    #[serde(default)]
    assignments: Vec<TrackedAssignment>,
}

impl TryFrom<RawOrchestrationState> for OrchestrationState {
    type Error = OrchestrationStateError;

    fn try_from(raw: RawOrchestrationState) -> Result<Self, Self::Error> {
        Self::from_assignments(raw.assignments)
    }
}

impl OrchestrationState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a state from existing assignments, checking uniqueness.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestrationStateError::ConflictingTask`] when a task is
    /// tracked twice, or [`OrchestrationStateError::DuplicateSession`] when a
    /// session is tracked twice.
    pub fn from_assignments(
        assignments: Vec<TrackedAssignment>,
    ) -> Result<Self, OrchestrationStateError> {
        let mut tasks = HashSet::new();
        let mut sessions = HashSet::new();
        for tracked in &assignments {
            if !tasks.insert(tracked.task_id().clone()) {
                return Err(OrchestrationStateError::ConflictingTask(
                    tracked.task_id().clone(),
                ));
            }
            if !sessions.insert(tracked.session_id()) {
                return Err(OrchestrationStateError::DuplicateSession(
                    tracked.session_id(),
                ));
            }
        }
        Ok(Self { assignments })
    }

    /// Returns every tracked assignment in insertion order.
    #[must_use]
    pub fn assignments(&self) -> &[TrackedAssignment] {
        &self.assignments
    }

    /// Returns `true` when nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Iterates assignments whose agents are believed to be working.
    pub fn spawned(&self) -> impl Iterator<Item = &TrackedAssignment> {
        self.assignments
            .iter()
            .filter(|tracked| matches!(tracked.status(), AssignmentStatus::Spawned))
    }

    /// Iterates completed assignments.
    pub fn completed(&self) -> impl Iterator<Item = &TrackedAssignment> {
        self.assignments
            .iter()
            .filter(|tracked| tracked.completion().is_some())
    }

    /// Iterates failed assignments.
    pub fn failed(&self) -> impl Iterator<Item = &TrackedAssignment> {
        self.assignments
            .iter()
            .filter(|tracked| tracked.failure().is_some())
    }

    /// Returns the number of spawned assignments.
    #[must_use]
    pub fn spawned_count(&self) -> usize {
        self.spawned().count()
    }

    /// Returns the number of completed assignments.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.completed().count()
    }

    /// Returns the number of failed assignments.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }

    /// Returns the assignment tracking `task_id`, if any.
    #[must_use]
    pub fn find_by_task(&self, task_id: &TaskId) -> Option<&TrackedAssignment> {
        self.assignments
            .iter()
            .find(|tracked| tracked.task_id() == task_id)
    }

    /// Returns the assignment of `session_id`, if any.
    #[must_use]
    pub fn find_by_session(&self, session_id: SessionId) -> Option<&TrackedAssignment> {
        self.assignments
            .iter()
            .find(|tracked| tracked.session_id() == session_id)
    }

    /// Returns `true` when the task is spawned or completed.
    ///
    /// Failed tasks are not counted so that they may be retried.
    #[must_use]
    pub fn is_assigned_or_done(&self, task_id: &TaskId) -> bool {
        self.find_by_task(task_id)
            .is_some_and(|tracked| tracked.failure().is_none())
    }

    /// Records a freshly spawned agent.
    ///
    /// A failed assignment for the same task is superseded and returned.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestrationStateError::TaskAlreadyAssigned`] when the task
    /// is spawned or completed, or
    /// [`OrchestrationStateError::DuplicateSession`] when the session is
    /// already tracked.
    pub fn record_spawn(
        &mut self,
        assignment: AgentAssignment,
    ) -> Result<Option<TrackedAssignment>, OrchestrationStateError> {
        if self.is_assigned_or_done(&assignment.task_id) {
            return Err(OrchestrationStateError::TaskAlreadyAssigned(
                assignment.task_id,
            ));
        }
        if self.find_by_session(assignment.session_id).is_some() {
            return Err(OrchestrationStateError::DuplicateSession(
                assignment.session_id,
            ));
        }

        let superseded = self
            .assignments
            .iter()
            .position(|tracked| tracked.task_id() == &assignment.task_id)
            .map(|index| self.assignments.remove(index));
        self.assignments
            .push(TrackedAssignment::new(assignment, AssignmentStatus::Spawned));
        Ok(superseded)
    }

    /// Moves a spawned assignment to completed.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestrationStateError::UnknownSession`] when the session is
    /// not tracked, or [`OrchestrationStateError::AlreadyTerminal`] when the
    /// assignment is no longer spawned.
    pub fn mark_completed(
        &mut self,
        session_id: SessionId,
        outcome: CompletionOutcome,
    ) -> Result<&TrackedAssignment, OrchestrationStateError> {
        self.transition(session_id, AssignmentStatus::Completed(outcome))
    }

    /// Moves a spawned assignment to failed.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestrationStateError::UnknownSession`] when the session is
    /// not tracked, or [`OrchestrationStateError::AlreadyTerminal`] when the
    /// assignment is no longer spawned.
    pub fn mark_failed(
        &mut self,
        session_id: SessionId,
        record: FailureRecord,
    ) -> Result<&TrackedAssignment, OrchestrationStateError> {
        self.transition(session_id, AssignmentStatus::Failed(record))
    }

    fn transition(
        &mut self,
        session_id: SessionId,
        next: AssignmentStatus,
    ) -> Result<&TrackedAssignment, OrchestrationStateError> {
        let tracked = self
            .assignments
            .iter_mut()
            .find(|tracked| tracked.session_id() == session_id)
            .ok_or(OrchestrationStateError::UnknownSession(session_id))?;
        if tracked.status().is_terminal() {
            return Err(OrchestrationStateError::AlreadyTerminal {
                session_id,
                status: tracked.status().as_str(),
            });
        }
        tracked.set_status(next);
        Ok(tracked)
    }
}
