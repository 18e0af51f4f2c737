//! Repository port for whole-record workflow state persistence.

use crate::workflow::domain::{SessionId, WorkflowState};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for workflow state repository operations.
pub type WorkflowStateResult<T> = Result<T, WorkflowStateError>;

/// Workflow state persistence contract.
///
/// `save` replaces the stored record for the session in one write. The
/// backing store offers no field-level atomicity, so callers must serialise
/// writers of the same session.
#[async_trait]
pub trait WorkflowStateRepository: Send + Sync {
    /// Finds the workflow state owned by a session.
    ///
    /// Returns `None` when the session has no workflow state.
    async fn find(&self, session_id: SessionId) -> WorkflowStateResult<Option<WorkflowState>>;

    /// Inserts or replaces the workflow state of its session.
    async fn save(&self, state: &WorkflowState) -> WorkflowStateResult<()>;
}

/// Errors returned by workflow state repository implementations.
#[derive(Debug, Clone, Error)]
pub enum WorkflowStateError {
    /// A persisted row could not be decoded.
    #[error("invalid persisted workflow state: {0}")]
    InvalidPersistedData(Arc<dyn std::error::Error + Send + Sync>),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl WorkflowStateError {
    /// Wraps a data-quality or deserialization error from persisted rows.
    pub fn invalid_persisted_data(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::InvalidPersistedData(Arc::new(err))
    }

    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
