//! Error types for orchestration state invariants.

use crate::task::domain::TaskId;
use crate::workflow::domain::SessionId;
use thiserror::Error;

/// Violations of the orchestration state invariants.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrchestrationStateError {
    /// The isolation resource identifier is empty after trimming.
    #[error("isolation resource identifier must not be empty")]
    EmptyResourceId,

    /// The task already has a spawned or completed assignment.
    #[error("task {0} already has a spawned or completed assignment")]
    TaskAlreadyAssigned(TaskId),

    /// The task appears in more than one assignment.
    #[error("task {0} is tracked by more than one assignment")]
    ConflictingTask(TaskId),

    /// The session already has an assignment.
    #[error("session {0} is already tracked")]
    DuplicateSession(SessionId),

    /// No assignment exists for the session.
    #[error("session {0} is not tracked")]
    UnknownSession(SessionId),

    /// The assignment already reached a terminal status.
    #[error("assignment for session {session_id} is already {status}")]
    AlreadyTerminal {
        /// Session of the assignment.
        session_id: SessionId,
        /// Terminal status the assignment holds.
        status: &'static str,
    },
}
