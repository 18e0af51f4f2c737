//! In-memory isolation provider.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::orchestration::{
    domain::IsolationResourceId,
    ports::{
        IsolationError, IsolationProvider, IsolationRequest, IsolationResource, IsolationResult,
        IsolationStatus,
    },
};
use crate::task::domain::TaskId;
use crate::workflow::domain::SessionId;

#[derive(Debug, Default)]
struct ProviderState {
    resources: BTreeMap<IsolationResourceId, IsolationResource>,
    next_id: u64,
    failing_tasks: HashSet<TaskId>,
    lookups_unavailable: bool,
}

/// Isolation provider that tracks resources and claims in memory.
///
/// Claims live in the provider rather than the execution backend, so they
/// survive [`super::InMemoryExecutionBackend::restart`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryIsolationProvider {
    state: Arc<RwLock<ProviderState>>,
}

fn poisoned<E: std::fmt::Display>(err: E) -> IsolationError {
    IsolationError::provider(std::io::Error::other(err.to_string()))
}

impl InMemoryIsolationProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `create` fail for `task_id`.
    ///
    /// # Errors
    ///
    /// Returns [`IsolationError::Provider`] when the lock is poisoned.
    pub fn fail_create_for(&self, task_id: TaskId) -> IsolationResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.failing_tasks.insert(task_id);
        Ok(())
    }

    /// Makes `get` fail until reset.
    ///
    /// # Errors
    ///
    /// Returns [`IsolationError::Provider`] when the lock is poisoned.
    pub fn set_lookups_unavailable(&self, unavailable: bool) -> IsolationResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.lookups_unavailable = unavailable;
        Ok(())
    }

    /// Returns the current owner of a resource.
    ///
    /// # Errors
    ///
    /// Returns [`IsolationError::NotFound`] for unknown resources.
    pub fn owner_of(&self, id: &IsolationResourceId) -> IsolationResult<Option<SessionId>> {
        let state = self.state.read().map_err(poisoned)?;
        state
            .resources
            .get(id)
            .map(|resource| resource.owner_session)
            .ok_or_else(|| IsolationError::NotFound(id.clone()))
    }

    /// Returns every resource ordered by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IsolationError::Provider`] when the lock is poisoned.
    pub fn resources(&self) -> IsolationResult<Vec<IsolationResource>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.resources.values().cloned().collect())
    }
}

#[async_trait]
impl IsolationProvider for InMemoryIsolationProvider {
    async fn create(&self, request: &IsolationRequest) -> IsolationResult<IsolationResource> {
        let mut state = self.state.write().map_err(poisoned)?;
        if state.failing_tasks.contains(&request.task_id) {
            return Err(IsolationError::CreateFailed(format!(
                "cannot create worktree for task {}",
                request.task_id
            )));
        }
        state.next_id += 1;
        let id = IsolationResourceId::new(format!("wt-{}", state.next_id))
            .map_err(IsolationError::provider)?;
        let resource = IsolationResource {
            id: id.clone(),
            task_id: Some(request.task_id.clone()),
            branch: request.branch.clone(),
            base_branch: request.base_branch.clone(),
            path: format!("/worktrees/{id}"),
            owner_session: None,
            status: IsolationStatus::Active,
        };
        state.resources.insert(id, resource.clone());
        Ok(resource)
    }

    async fn find_by_task(&self, task_id: &TaskId) -> IsolationResult<Option<IsolationResource>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .resources
            .values()
            .find(|resource| resource.is_active() && resource.task_id.as_ref() == Some(task_id))
            .cloned())
    }

    async fn get(&self, id: &IsolationResourceId) -> IsolationResult<Option<IsolationResource>> {
        let state = self.state.read().map_err(poisoned)?;
        if state.lookups_unavailable {
            return Err(IsolationError::provider(std::io::Error::other(
                "isolation lookups unavailable",
            )));
        }
        Ok(state.resources.get(id).cloned())
    }

    async fn claim(
        &self,
        id: &IsolationResourceId,
        session_id: SessionId,
    ) -> IsolationResult<IsolationResource> {
        let mut state = self.state.write().map_err(poisoned)?;
        let resource = state
            .resources
            .get_mut(id)
            .ok_or_else(|| IsolationError::NotFound(id.clone()))?;
        match resource.owner_session {
            Some(owner) if owner != session_id => Err(IsolationError::AlreadyClaimed {
                id: id.clone(),
                owner,
            }),
            _ => {
                resource.owner_session = Some(session_id);
                Ok(resource.clone())
            }
        }
    }

    async fn release(
        &self,
        id: &IsolationResourceId,
        session_id: SessionId,
    ) -> IsolationResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        let resource = state
            .resources
            .get_mut(id)
            .ok_or_else(|| IsolationError::NotFound(id.clone()))?;
        if resource.is_claimed_by(session_id) {
            resource.owner_session = None;
        }
        Ok(())
    }

    async fn mark_abandoned(&self, id: &IsolationResourceId) -> IsolationResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        let resource = state
            .resources
            .get_mut(id)
            .ok_or_else(|| IsolationError::NotFound(id.clone()))?;
        resource.status = IsolationStatus::Abandoned;
        resource.owner_session = None;
        Ok(())
    }
}
