//! Task status and task type enumerations.

use super::{ParseTaskStatusError, ParseTaskTypeError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a task as reported by the task store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task is waiting to be picked up.
    Open,
    /// An agent is working on the task.
    InProgress,
    /// Work is finished and awaiting review.
    Review,
    /// Task has been closed.
    Closed,
    /// Task needs human attention.
    Escalated,
}

impl TaskStatus {
    /// All statuses in display order.
    pub const ALL: [Self; 5] = [
        Self::Open,
        Self::InProgress,
        Self::Review,
        Self::Closed,
        Self::Escalated,
    ];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Review => "review",
            Self::Closed => "closed",
            Self::Escalated => "escalated",
        }
    }

    /// Returns `true` for the closed status.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseTaskStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "open" => Ok(Self::Open),
            "in_progress" => Ok(Self::InProgress),
            "review" => Ok(Self::Review),
            "closed" => Ok(Self::Closed),
            "escalated" => Ok(Self::Escalated),
            _ => Err(ParseTaskStatusError(value.to_owned())),
        }
    }
}

/// Kind of work a task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Ordinary unit of work.
    #[default]
    Task,
    /// Defect fix.
    Bug,
    /// New functionality.
    Feature,
    /// Maintenance work.
    Chore,
    /// Container grouping other tasks; never executed directly.
    Epic,
}

impl TaskType {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Bug => "bug",
            Self::Feature => "feature",
            Self::Chore => "chore",
            Self::Epic => "epic",
        }
    }

    /// Returns `true` when tasks of this type only group other tasks.
    #[must_use]
    pub const fn is_container(self) -> bool {
        matches!(self, Self::Epic)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskType {
    type Error = ParseTaskTypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "task" => Ok(Self::Task),
            "bug" => Ok(Self::Bug),
            "feature" => Ok(Self::Feature),
            "chore" => Ok(Self::Chore),
            "epic" => Ok(Self::Epic),
            _ => Err(ParseTaskTypeError(value.to_owned())),
        }
    }
}
