//! In-memory execution backend.

use async_trait::async_trait;
use mockable::{Clock, DefaultClock};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::orchestration::{
    domain::RunId,
    ports::{
        ExecutionBackend, ExecutionError, ExecutionResult, PreparedRun, RunRequest, RunningAgent,
        SpawnCapacity,
    },
};
use crate::task::domain::TaskId;
use crate::workflow::domain::SessionId;

/// Default maximum agent depth.
pub const DEFAULT_MAX_AGENT_DEPTH: u32 = 3;

/// Step at which an injected spawn failure fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    /// `prepare_run` fails.
    Prepare,
    /// `dispatch` fails.
    Dispatch,
}

/// Lifecycle phase of a run known to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Prepared, not yet started.
    Prepared,
    /// Started.
    Dispatched,
    /// Discarded.
    Abandoned,
}

#[derive(Debug, Clone)]
struct RunRecord {
    run: PreparedRun,
    request: RunRequest,
    phase: RunPhase,
}

#[derive(Debug, Default)]
struct BackendState {
    runs: HashMap<SessionId, RunRecord>,
    registry: HashMap<SessionId, RunningAgent>,
    depths: HashMap<SessionId, u32>,
    failures: HashMap<TaskId, FailurePoint>,
    registry_unavailable: bool,
}

/// Execution backend that keeps runs and the running-agent registry in
/// memory.
///
/// Test hooks simulate agent exits, daemon restarts (registry cleared, runs
/// kept), registry outages and per-task spawn failures.
#[derive(Debug, Clone)]
pub struct InMemoryExecutionBackend {
    state: Arc<RwLock<BackendState>>,
    max_depth: u32,
}

impl Default for InMemoryExecutionBackend {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_AGENT_DEPTH)
    }
}

fn poisoned<E: std::fmt::Display>(err: E) -> ExecutionError {
    ExecutionError::backend(std::io::Error::other(err.to_string()))
}

impl InMemoryExecutionBackend {
    /// Creates a backend refusing spawns from sessions at `max_depth`.
    #[must_use]
    pub fn new(max_depth: u32) -> Self {
        Self {
            state: Arc::new(RwLock::new(BackendState::default())),
            max_depth,
        }
    }

    /// Makes spawns for `task_id` fail at `point`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::Backend`] when the lock is poisoned.
    pub fn fail_task_at(&self, task_id: TaskId, point: FailurePoint) -> ExecutionResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.failures.insert(task_id, point);
        Ok(())
    }

    /// Removes an injected failure.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::Backend`] when the lock is poisoned.
    pub fn clear_failure(&self, task_id: &TaskId) -> ExecutionResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.failures.remove(task_id);
        Ok(())
    }

    /// Simulates the agent process of `session_id` exiting.
    ///
    /// Returns `true` when the session was running.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::Backend`] when the lock is poisoned.
    pub fn exit(&self, session_id: SessionId) -> ExecutionResult<bool> {
        let mut state = self.state.write().map_err(poisoned)?;
        Ok(state.registry.remove(&session_id).is_some())
    }

    /// Simulates a daemon restart: the running-agent registry is emptied.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::Backend`] when the lock is poisoned.
    pub fn restart(&self) -> ExecutionResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.registry.clear();
        Ok(())
    }

    /// Makes registry lookups fail until reset.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::Backend`] when the lock is poisoned.
    pub fn set_registry_unavailable(&self, unavailable: bool) -> ExecutionResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.registry_unavailable = unavailable;
        Ok(())
    }

    /// Records the agent depth of a session that was not spawned here.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::Backend`] when the lock is poisoned.
    pub fn set_session_depth(&self, session_id: SessionId, depth: u32) -> ExecutionResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.depths.insert(session_id, depth);
        Ok(())
    }

    /// Returns the sessions currently in the registry.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::Backend`] when the lock is poisoned.
    pub fn running_sessions(&self) -> ExecutionResult<Vec<SessionId>> {
        let state = self.state.read().map_err(poisoned)?;
        let mut sessions: Vec<SessionId> = state.registry.keys().copied().collect();
        sessions.sort();
        Ok(sessions)
    }

    /// Returns the request a session was prepared from.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::Backend`] when the lock is poisoned.
    pub fn request_for(&self, session_id: SessionId) -> ExecutionResult<Option<RunRequest>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .runs
            .get(&session_id)
            .map(|record| record.request.clone()))
    }

    /// Returns the phase of the run owned by `session_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::Backend`] when the lock is poisoned.
    pub fn phase_of(&self, session_id: SessionId) -> ExecutionResult<Option<RunPhase>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.runs.get(&session_id).map(|record| record.phase))
    }

    /// Returns the session of the newest dispatched run for `task_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::Backend`] when the lock is poisoned.
    pub fn session_for_task(&self, task_id: &TaskId) -> ExecutionResult<Option<SessionId>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .runs
            .values()
            .filter(|record| {
                record.request.task_id == *task_id && record.phase == RunPhase::Dispatched
            })
            .filter_map(|record| {
                state
                    .registry
                    .get(&record.run.session_id)
                    .map(|agent| (agent.started_at, record.run.session_id))
            })
            .max()
            .map(|(_, session_id)| session_id))
    }

    fn injected_failure(state: &BackendState, task_id: &TaskId) -> Option<FailurePoint> {
        state.failures.get(task_id).copied()
    }
}

#[async_trait]
impl ExecutionBackend for InMemoryExecutionBackend {
    async fn can_spawn(&self, parent_session_id: SessionId) -> ExecutionResult<SpawnCapacity> {
        let state = self.state.read().map_err(poisoned)?;
        let depth = state.depths.get(&parent_session_id).copied().unwrap_or(0);
        if depth >= self.max_depth {
            return Ok(SpawnCapacity::refused(
                format!("maximum agent depth {} reached", self.max_depth),
                depth,
            ));
        }
        Ok(SpawnCapacity::allowed(depth))
    }

    async fn prepare_run(&self, request: &RunRequest) -> ExecutionResult<PreparedRun> {
        let mut state = self.state.write().map_err(poisoned)?;
        if Self::injected_failure(&state, &request.task_id) == Some(FailurePoint::Prepare) {
            return Err(ExecutionError::PrepareFailed(format!(
                "injected failure for task {}",
                request.task_id
            )));
        }
        let run = PreparedRun {
            session_id: SessionId::new(),
            run_id: RunId::new(),
        };
        state.depths.insert(run.session_id, request.agent_depth);
        state.runs.insert(
            run.session_id,
            RunRecord {
                run,
                request: request.clone(),
                phase: RunPhase::Prepared,
            },
        );
        Ok(run)
    }

    async fn dispatch(&self, run: &PreparedRun) -> ExecutionResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        let task_id = state
            .runs
            .get(&run.session_id)
            .filter(|record| record.run.run_id == run.run_id)
            .map(|record| record.request.task_id.clone())
            .ok_or(ExecutionError::UnknownRun(run.run_id))?;
        if Self::injected_failure(&state, &task_id) == Some(FailurePoint::Dispatch) {
            return Err(ExecutionError::DispatchFailed(format!(
                "injected failure for task {task_id}"
            )));
        }
        if let Some(record) = state.runs.get_mut(&run.session_id) {
            record.phase = RunPhase::Dispatched;
        }
        state.registry.insert(
            run.session_id,
            RunningAgent {
                session_id: run.session_id,
                run_id: run.run_id,
                started_at: DefaultClock.utc(),
            },
        );
        Ok(())
    }

    async fn running_agent(
        &self,
        session_id: SessionId,
    ) -> ExecutionResult<Option<RunningAgent>> {
        let state = self.state.read().map_err(poisoned)?;
        if state.registry_unavailable {
            return Err(ExecutionError::backend(std::io::Error::other(
                "running-agent registry unavailable",
            )));
        }
        Ok(state.registry.get(&session_id).cloned())
    }

    async fn abandon_run(&self, run: &PreparedRun, _reason: &str) -> ExecutionResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        let record = state
            .runs
            .get_mut(&run.session_id)
            .ok_or(ExecutionError::UnknownRun(run.run_id))?;
        record.phase = RunPhase::Abandoned;
        state.registry.remove(&run.session_id);
        Ok(())
    }
}
