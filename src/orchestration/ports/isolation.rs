//! Isolation provider port: per-task working copies and their claims.

use crate::orchestration::domain::IsolationResourceId;
use crate::task::domain::TaskId;
use crate::workflow::domain::SessionId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Result type for isolation provider operations.
pub type IsolationResult<T> = Result<T, IsolationError>;

/// Lifecycle status of an isolation resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationStatus {
    /// Usable.
    Active,
    /// Given up; never reused.
    Abandoned,
}

/// An isolated working copy of the repository.
///
/// Claims are durable: they survive daemon restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsolationResource {
    /// Resource identifier.
    pub id: IsolationResourceId,
    /// Task the resource was created for, if any.
    pub task_id: Option<TaskId>,
    /// Checked-out branch.
    pub branch: String,
    /// Branch the resource was created from.
    pub base_branch: String,
    /// Filesystem path of the working copy.
    pub path: String,
    /// Session currently claiming the resource.
    pub owner_session: Option<SessionId>,
    /// Lifecycle status.
    pub status: IsolationStatus,
}

impl IsolationResource {
    /// Returns `true` while the resource may be used.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == IsolationStatus::Active
    }

    /// Returns `true` when `session_id` holds the claim.
    #[must_use]
    pub fn is_claimed_by(&self, session_id: SessionId) -> bool {
        self.owner_session == Some(session_id)
    }
}

/// Parameters for creating an isolation resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsolationRequest {
    /// Task the resource is for.
    pub task_id: TaskId,
    /// Branch to create.
    pub branch: String,
    /// Branch to fork from.
    pub base_branch: String,
}

/// Isolation resource management contract.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IsolationProvider: Send + Sync {
    /// Creates a new resource.
    async fn create(&self, request: &IsolationRequest) -> IsolationResult<IsolationResource>;

    /// Finds the resource created for a task, if any.
    async fn find_by_task(&self, task_id: &TaskId) -> IsolationResult<Option<IsolationResource>>;

    /// Looks up a resource by identifier.
    async fn get(&self, id: &IsolationResourceId) -> IsolationResult<Option<IsolationResource>>;

    /// Claims the resource for a session.
    ///
    /// # Errors
    ///
    /// Returns [`IsolationError::AlreadyClaimed`] when another session owns
    /// it.
    async fn claim(
        &self,
        id: &IsolationResourceId,
        session_id: SessionId,
    ) -> IsolationResult<IsolationResource>;

    /// Releases a claim held by `session_id`. Releasing a claim held by
    /// nobody or by another session is a no-op.
    async fn release(&self, id: &IsolationResourceId, session_id: SessionId)
    -> IsolationResult<()>;

    /// Marks the resource abandoned and drops any claim.
    async fn mark_abandoned(&self, id: &IsolationResourceId) -> IsolationResult<()>;
}

/// Errors returned by isolation providers.
#[derive(Debug, Clone, Error)]
pub enum IsolationError {
    /// The resource does not exist.
    #[error("isolation resource not found: {0}")]
    NotFound(IsolationResourceId),

    /// Another session holds the claim.
    #[error("isolation resource {id} is claimed by session {owner}")]
    AlreadyClaimed {
        /// Contested resource.
        id: IsolationResourceId,
        /// Current owner.
        owner: SessionId,
    },

    /// Creating the resource failed.
    #[error("failed to create isolation resource: {0}")]
    CreateFailed(String),

    /// Provider infrastructure failure.
    #[error("isolation provider error: {0}")]
    Provider(Arc<dyn std::error::Error + Send + Sync>),
}

impl IsolationError {
    /// Wraps a provider infrastructure error.
    pub fn provider(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Provider(Arc::new(err))
    }
}
