//! In-memory repository for workflow state.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::workflow::{
    domain::{SessionId, WorkflowState},
    ports::{WorkflowStateError, WorkflowStateRepository, WorkflowStateResult},
};

/// Thread-safe in-memory workflow state repository.
///
/// Clones share storage, so a clone handed to a second orchestrator instance
/// models a daemon restart against the same durable store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorkflowStateRepository {
    states: Arc<RwLock<HashMap<SessionId, WorkflowState>>>,
    saves: Arc<RwLock<usize>>,
}

impl InMemoryWorkflowStateRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many times `save` has succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowStateError::Persistence`] when the lock is poisoned.
    pub fn save_count(&self) -> WorkflowStateResult<usize> {
        let saves = self.saves.read().map_err(poisoned)?;
        Ok(*saves)
    }
}

fn poisoned<E: std::fmt::Display>(err: E) -> WorkflowStateError {
    WorkflowStateError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl WorkflowStateRepository for InMemoryWorkflowStateRepository {
    async fn find(&self, session_id: SessionId) -> WorkflowStateResult<Option<WorkflowState>> {
        let states = self.states.read().map_err(poisoned)?;
        Ok(states.get(&session_id).cloned())
    }

    async fn save(&self, state: &WorkflowState) -> WorkflowStateResult<()> {
        {
            let mut states = self.states.write().map_err(poisoned)?;
            states.insert(state.session_id(), state.clone());
        }
        let mut saves = self.saves.write().map_err(poisoned)?;
        *saves += 1;
        Ok(())
    }
}
