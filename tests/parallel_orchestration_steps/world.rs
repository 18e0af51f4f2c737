//! Shared world state for parallel orchestration BDD scenarios.

use std::sync::Arc;

use chantier::orchestration::{
    adapters::{
        WorkflowStateStore,
        memory::{InMemoryExecutionBackend, InMemoryIsolationProvider},
    },
    config::OrchestrationConfig,
    domain::{OrchestrationReport, OrchestrationState, PollReport},
    ports::OrchestrationStateStore,
    services::{OrchestrationError, ParallelOrchestrator},
};
use chantier::task::{adapters::memory::InMemoryTaskStore, domain::TaskId};
use chantier::workflow::{adapters::memory::InMemoryWorkflowStateRepository, domain::SessionId};
use mockable::DefaultClock;
use rstest::fixture;

/// State store used by the BDD world.
pub type TestStateStore = WorkflowStateStore<InMemoryWorkflowStateRepository, DefaultClock>;

/// Orchestrator used by the BDD world.
pub type TestOrchestrator = ParallelOrchestrator<InMemoryTaskStore, TestStateStore, DefaultClock>;

/// Scenario world for parallel orchestration behaviour tests.
pub struct OrchestrationWorld {
    pub tasks: Arc<InMemoryTaskStore>,
    pub states: Arc<TestStateStore>,
    pub execution: Arc<InMemoryExecutionBackend>,
    pub isolation: Arc<InMemoryIsolationProvider>,
    pub orchestrator: TestOrchestrator,
    pub parent_task: Option<TaskId>,
    pub parent_session: Option<SessionId>,
    pub last_report: Option<Result<OrchestrationReport, OrchestrationError>>,
    pub last_poll: Option<Result<PollReport, OrchestrationError>>,
}

fn build_orchestrator(
    tasks: &Arc<InMemoryTaskStore>,
    states: &Arc<TestStateStore>,
    execution: &Arc<InMemoryExecutionBackend>,
    isolation: &Arc<InMemoryIsolationProvider>,
) -> TestOrchestrator {
    ParallelOrchestrator::new(
        Arc::clone(tasks),
        Arc::clone(states),
        Arc::new(DefaultClock),
        OrchestrationConfig::default(),
    )
    .expect("default config is valid")
    .with_execution_backend(execution.clone())
    .with_isolation_provider(isolation.clone())
}

impl OrchestrationWorld {
    /// Creates a world with empty stores and no parent yet.
    #[must_use]
    pub fn new() -> Self {
        let tasks = Arc::new(InMemoryTaskStore::new());
        let states = Arc::new(WorkflowStateStore::new(
            Arc::new(InMemoryWorkflowStateRepository::new()),
            Arc::new(DefaultClock),
            "parallel-orchestrator",
            "orchestrate",
        ));
        let execution = Arc::new(InMemoryExecutionBackend::default());
        let isolation = Arc::new(InMemoryIsolationProvider::new());
        let orchestrator = build_orchestrator(&tasks, &states, &execution, &isolation);
        Self {
            tasks,
            states,
            execution,
            isolation,
            orchestrator,
            parent_task: None,
            parent_session: None,
            last_report: None,
            last_poll: None,
        }
    }

    /// Replaces the orchestrator with one built over the same stores.
    pub fn rebuild_orchestrator(&mut self) {
        self.orchestrator =
            build_orchestrator(&self.tasks, &self.states, &self.execution, &self.isolation);
    }

    /// Returns the parent task and session set up by earlier steps.
    ///
    /// # Errors
    ///
    /// Returns an error when either is missing.
    pub fn parent(&self) -> Result<(TaskId, SessionId), eyre::Report> {
        let task = self
            .parent_task
            .clone()
            .ok_or_else(|| eyre::eyre!("missing parent task in scenario world"))?;
        let session = self
            .parent_session
            .ok_or_else(|| eyre::eyre!("missing parent session in scenario world"))?;
        Ok((task, session))
    }

    /// Loads the persisted orchestration state.
    ///
    /// # Errors
    ///
    /// Returns an error when the session is missing or the read fails.
    pub fn state(&self) -> Result<OrchestrationState, eyre::Report> {
        let (_, session) = self.parent()?;
        let found = run_async(self.states.find(session))?;
        Ok(found.unwrap_or_default())
    }

    /// Returns the last orchestration report.
    ///
    /// # Errors
    ///
    /// Returns an error when no pass ran or the pass failed.
    pub fn report(&self) -> Result<&OrchestrationReport, eyre::Report> {
        match self.last_report.as_ref() {
            Some(Ok(report)) => Ok(report),
            Some(Err(err)) => Err(eyre::eyre!("orchestration failed: {err}")),
            None => Err(eyre::eyre!("missing orchestration report")),
        }
    }

    /// Returns the last poll report.
    ///
    /// # Errors
    ///
    /// Returns an error when no poll ran or the poll failed.
    pub fn poll(&self) -> Result<&PollReport, eyre::Report> {
        match self.last_poll.as_ref() {
            Some(Ok(report)) => Ok(report),
            Some(Err(err)) => Err(eyre::eyre!("poll failed: {err}")),
            None => Err(eyre::eyre!("missing poll report")),
        }
    }
}

impl Default for OrchestrationWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> OrchestrationWorld {
    OrchestrationWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
