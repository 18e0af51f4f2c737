//! Persistence port for per-session orchestration state.

use crate::orchestration::domain::{OrchestrationState, OrchestrationStateError};
use crate::workflow::domain::SessionId;
use crate::workflow::ports::WorkflowStateError;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for orchestration state store operations.
pub type StateStoreResult<T> = Result<T, StateStoreError>;

/// Orchestration state persistence contract.
#[async_trait]
pub trait OrchestrationStateStore: Send + Sync {
    /// Loads the state owned by `session_id`.
    ///
    /// Returns `None` when the session never stored any state.
    async fn find(&self, session_id: SessionId) -> StateStoreResult<Option<OrchestrationState>>;

    /// Replaces the whole state owned by `session_id`.
    async fn save(&self, session_id: SessionId, state: &OrchestrationState)
    -> StateStoreResult<()>;
}

/// Errors returned by orchestration state stores.
#[derive(Debug, Clone, Error)]
pub enum StateStoreError {
    /// The stored envelope uses a schema version this build cannot read.
    #[error("unsupported orchestration state schema version: {0}")]
    UnsupportedSchemaVersion(u32),

    /// The stored state could not be decoded.
    #[error("failed to decode orchestration state: {0}")]
    Decode(Arc<dyn std::error::Error + Send + Sync>),

    /// The state could not be encoded.
    #[error("failed to encode orchestration state: {0}")]
    Encode(Arc<dyn std::error::Error + Send + Sync>),

    /// The stored assignments violate state invariants.
    #[error(transparent)]
    InvalidState(#[from] OrchestrationStateError),

    /// The underlying workflow state repository failed.
    #[error(transparent)]
    Workflow(#[from] WorkflowStateError),
}

impl StateStoreError {
    /// Wraps a decoding error.
    pub fn decode(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Decode(Arc::new(err))
    }

    /// Wraps an encoding error.
    pub fn encode(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Encode(Arc::new(err))
    }
}
