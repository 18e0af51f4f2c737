//! Orchestration state stored inside the session's workflow state.

use async_trait::async_trait;
use mockable::Clock;
use std::sync::Arc;
use tracing::{debug, info};

use crate::orchestration::{
    domain::OrchestrationState,
    ports::{OrchestrationStateStore, StateStoreResult},
    versioning::{LEGACY_VARIABLES, STATE_VARIABLE, StateUpgrader, VersionedSnapshot},
};
use crate::workflow::{
    domain::{SessionId, WorkflowState},
    ports::WorkflowStateRepository,
};

/// State store that keeps each session's state in one workflow variable.
///
/// Every save reads the whole workflow record, replaces the state variable
/// and writes the whole record back. A session without workflow state gets
/// a fresh record positioned at the configured workflow and step.
#[derive(Clone)]
pub struct WorkflowStateStore<W, C>
where
    W: WorkflowStateRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<W>,
    clock: Arc<C>,
    workflow_name: String,
    step: String,
}

impl<W, C> WorkflowStateStore<W, C>
where
    W: WorkflowStateRepository,
    C: Clock + Send + Sync,
{
    /// Creates a store over `repository`.
    ///
    /// `workflow_name` and `step` are used only when a session has no
    /// workflow state yet.
    #[must_use]
    pub fn new(
        repository: Arc<W>,
        clock: Arc<C>,
        workflow_name: impl Into<String>,
        step: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            clock,
            workflow_name: workflow_name.into(),
            step: step.into(),
        }
    }

    fn decode(workflow: &WorkflowState) -> StateStoreResult<Option<OrchestrationState>> {
        let upgrader = StateUpgrader::new(workflow.updated_at());
        if let Some(value) = workflow.variable(STATE_VARIABLE) {
            let snapshot = VersionedSnapshot::from_variable(value)?;
            return upgrader.decode(snapshot).map(Some);
        }
        match VersionedSnapshot::from_legacy_variables(workflow.variables()) {
            Some(legacy) => {
                info!(
                    session_id = %workflow.session_id(),
                    "upgrading legacy orchestration state"
                );
                upgrader.decode(legacy).map(Some)
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl<W, C> OrchestrationStateStore for WorkflowStateStore<W, C>
where
    W: WorkflowStateRepository,
    C: Clock + Send + Sync,
{
    async fn find(&self, session_id: SessionId) -> StateStoreResult<Option<OrchestrationState>> {
        let Some(workflow) = self.repository.find(session_id).await? else {
            return Ok(None);
        };
        Self::decode(&workflow)
    }

    async fn save(
        &self,
        session_id: SessionId,
        state: &OrchestrationState,
    ) -> StateStoreResult<()> {
        let snapshot = VersionedSnapshot::encode(StateUpgrader::CURRENT_VERSION, state)?;
        let mut workflow = match self.repository.find(session_id).await? {
            Some(existing) => existing,
            None => {
                debug!(%session_id, "creating workflow state for orchestration");
                WorkflowState::new(
                    session_id,
                    self.workflow_name.as_str(),
                    self.step.as_str(),
                    self.clock.as_ref(),
                )
            }
        };
        workflow.set_variable(STATE_VARIABLE, snapshot.to_variable()?, self.clock.as_ref());
        for key in LEGACY_VARIABLES {
            workflow.remove_variable(key, self.clock.as_ref());
        }
        self.repository.save(&workflow).await?;
        Ok(())
    }
}
