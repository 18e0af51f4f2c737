//! Shared harness for in-memory orchestration integration tests.

use std::collections::HashSet;
use std::sync::Arc;

use chantier::orchestration::{
    adapters::{
        WorkflowStateStore,
        memory::{InMemoryExecutionBackend, InMemoryIsolationProvider},
    },
    config::OrchestrationConfig,
    domain::{OrchestrationReport, OrchestrationState, PollReport},
    ports::OrchestrationStateStore,
    services::ParallelOrchestrator,
};
use chantier::task::{
    adapters::memory::InMemoryTaskStore,
    domain::{Task, TaskId, TaskType},
};
use chantier::workflow::{adapters::memory::InMemoryWorkflowStateRepository, domain::SessionId};
use eyre::{OptionExt, WrapErr};
use mockable::DefaultClock;
use rstest::fixture;

/// State store used by the harness.
pub type TestStateStore = WorkflowStateStore<InMemoryWorkflowStateRepository, DefaultClock>;

/// Orchestrator used by the harness.
pub type TestOrchestrator = ParallelOrchestrator<InMemoryTaskStore, TestStateStore, DefaultClock>;

/// Durable stores and collaborators plus one orchestrator instance.
///
/// Everything except the orchestrator outlives [`Self::restarted`], which
/// models a daemon restart: the running-agent registry is emptied and a new
/// orchestrator is built over the same stores.
pub struct OrchestrationHarness {
    pub tasks: Arc<InMemoryTaskStore>,
    pub workflows: Arc<InMemoryWorkflowStateRepository>,
    pub execution: Arc<InMemoryExecutionBackend>,
    pub isolation: Arc<InMemoryIsolationProvider>,
    pub orchestrator: TestOrchestrator,
    pub parent_session: SessionId,
    pub root: TaskId,
}

/// Builds a task identifier.
///
/// # Panics
///
/// Panics when `value` is blank.
#[must_use]
pub fn task_id(value: &str) -> TaskId {
    TaskId::new(value).expect("valid task id")
}

fn build_orchestrator(
    tasks: &Arc<InMemoryTaskStore>,
    workflows: &Arc<InMemoryWorkflowStateRepository>,
    execution: &Arc<InMemoryExecutionBackend>,
    isolation: &Arc<InMemoryIsolationProvider>,
) -> TestOrchestrator {
    let states = Arc::new(WorkflowStateStore::new(
        Arc::clone(workflows),
        Arc::new(DefaultClock),
        "parallel-orchestrator",
        "orchestrate",
    ));
    ParallelOrchestrator::new(
        Arc::clone(tasks),
        states,
        Arc::new(DefaultClock),
        OrchestrationConfig::default(),
    )
    .expect("default config is valid")
    .with_execution_backend(execution.clone())
    .with_isolation_provider(isolation.clone())
}

impl OrchestrationHarness {
    /// Creates a harness with an epic root task named `root`.
    #[must_use]
    pub fn new() -> Self {
        let tasks = Arc::new(InMemoryTaskStore::new());
        let root = task_id("root");
        tasks
            .insert(
                Task::new(root.clone(), "Root epic", &DefaultClock)
                    .expect("valid task")
                    .with_task_type(TaskType::Epic),
            )
            .expect("root insert should succeed");
        let workflows = Arc::new(InMemoryWorkflowStateRepository::new());
        let execution = Arc::new(InMemoryExecutionBackend::default());
        let isolation = Arc::new(InMemoryIsolationProvider::new());
        let orchestrator = build_orchestrator(&tasks, &workflows, &execution, &isolation);
        Self {
            tasks,
            workflows,
            execution,
            isolation,
            orchestrator,
            parent_session: SessionId::new(),
            root,
        }
    }

    /// Simulates a daemon restart and returns the harness of the new
    /// process.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend registry cannot be cleared.
    pub fn restarted(self) -> Result<Self, eyre::Report> {
        self.execution.restart().wrap_err("clear running registry")?;
        let orchestrator =
            build_orchestrator(&self.tasks, &self.workflows, &self.execution, &self.isolation);
        Ok(Self {
            orchestrator,
            ..self
        })
    }

    /// Adds an open child of the root.
    ///
    /// # Errors
    ///
    /// Returns an error when the insert fails.
    pub fn add_child(&self, value: &str, priority: u8) -> Result<(), eyre::Report> {
        self.add_task(
            Task::new(task_id(value), format!("Task {value}"), &DefaultClock)
                .wrap_err("build task")?
                .with_parent(self.root.clone())
                .with_priority(priority),
        )
    }

    /// Adds an arbitrary task.
    ///
    /// # Errors
    ///
    /// Returns an error when the insert fails.
    pub fn add_task(&self, task: Task) -> Result<(), eyre::Report> {
        self.tasks.insert(task).wrap_err("insert task")
    }

    /// Runs one orchestration pass under the root.
    ///
    /// # Errors
    ///
    /// Returns an error when the pass fails as a whole.
    pub async fn orchestrate(&self, max_concurrent: u32) -> Result<OrchestrationReport, eyre::Report> {
        self.orchestrator
            .orchestrate_ready_tasks(&self.root, self.parent_session, max_concurrent)
            .await
            .wrap_err("orchestrate ready tasks")
    }

    /// Runs one poll pass.
    ///
    /// # Errors
    ///
    /// Returns an error when the poll fails as a whole.
    pub async fn poll(&self) -> Result<PollReport, eyre::Report> {
        self.orchestrator
            .poll_agent_status(self.parent_session)
            .await
            .wrap_err("poll agent status")
    }

    /// Loads the persisted state of the parent session.
    ///
    /// # Errors
    ///
    /// Returns an error when the state cannot be read.
    pub async fn state(&self) -> Result<OrchestrationState, eyre::Report> {
        let store = WorkflowStateStore::new(
            Arc::clone(&self.workflows),
            Arc::new(DefaultClock),
            "parallel-orchestrator",
            "orchestrate",
        );
        Ok(store
            .find(self.parent_session)
            .await
            .wrap_err("load orchestration state")?
            .unwrap_or_default())
    }

    /// Closes a task the way a finishing agent would.
    ///
    /// # Errors
    ///
    /// Returns an error when the task does not exist.
    pub fn close_task(&self, value: &str, commit_sha: &str) -> Result<(), eyre::Report> {
        self.tasks
            .close(&task_id(value), Some("completed"), Some(commit_sha), &DefaultClock)
            .wrap_err("close task")
    }

    /// Returns the session spawned for a task in the persisted state.
    ///
    /// # Errors
    ///
    /// Returns an error when the task is not tracked.
    pub async fn session_of(&self, value: &str) -> Result<SessionId, eyre::Report> {
        self.state()
            .await?
            .find_by_task(&task_id(value))
            .map(|tracked| tracked.session_id())
            .ok_or_eyre(format!("task {value} is not tracked"))
    }

    /// Checks the state invariants that must hold after every call.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first violation.
    pub async fn assert_invariants(&self, max_concurrent: usize) -> Result<(), eyre::Report> {
        let state = self.state().await?;
        let mut seen = HashSet::new();
        for tracked in state.assignments() {
            eyre::ensure!(
                seen.insert(tracked.task_id().clone()),
                "task {} is tracked more than once",
                tracked.task_id()
            );
        }
        eyre::ensure!(
            state.spawned_count() <= max_concurrent,
            "{} agents spawned with a cap of {max_concurrent}",
            state.spawned_count()
        );
        Ok(())
    }
}

impl Default for OrchestrationHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Provides a fresh harness for each test.
#[fixture]
pub fn harness() -> OrchestrationHarness {
    OrchestrationHarness::new()
}

/// Returns the task identifiers of spawned agents in spawn order.
#[must_use]
pub fn spawned_tasks(report: &OrchestrationReport) -> Vec<String> {
    report
        .spawned
        .iter()
        .map(|agent| agent.task_id.to_string())
        .collect()
}
