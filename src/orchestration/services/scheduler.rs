//! Parallel orchestrator: spawns agents for ready tasks and reconciles them.
//!
//! The orchestrator is driven by repeated calls from a parent session. It
//! keeps no timers or threads of its own; every call loads the session's
//! state, does one bounded pass, and writes the state back.

use std::sync::Arc;

use mockable::Clock;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::{AgentPromptRenderer, Liveness, LivenessOracle, PromptRenderError, SessionGate};
use crate::orchestration::{
    config::{ConfigError, OrchestrationConfig},
    domain::{
        AgentAssignment, CAPACITY_SKIP_REASON, CompletedAgent, CompletionOutcome,
        EXITED_WITHOUT_COMPLETING, FailedAgent, FailureRecord, OrchestrationReport,
        OrchestrationState, OrchestrationStateError, OrchestrationStatus, PollReport,
        RunningAgentSummary, SpawnFailure, SpawnedAgent,
    },
    ports::{
        ExecutionBackend, ExecutionError, IsolationError, IsolationProvider, IsolationRequest,
        IsolationResource, OrchestrationStateStore, PreparedRun, RunRequest, StateStoreError,
    },
};
use crate::task::{
    domain::{Task, TaskId, TaskStatus},
    ports::{TaskStore, TaskStoreError},
    services::TaskReadinessResolver,
};
use crate::workflow::domain::SessionId;

/// Result type for orchestrator operations.
pub type OrchestrationResult<T> = Result<T, OrchestrationError>;

/// Errors that fail a whole orchestrator call.
#[derive(Debug, Clone, Error)]
pub enum OrchestrationError {
    /// A required collaborator was never configured.
    #[error("{0} is not configured")]
    MissingCollaborator(&'static str),

    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Reading the task store failed.
    #[error(transparent)]
    TaskStore(#[from] TaskStoreError),

    /// Reading or writing orchestration state failed.
    #[error(transparent)]
    StateStore(#[from] StateStoreError),

    /// An update would break orchestration state invariants.
    #[error(transparent)]
    State(#[from] OrchestrationStateError),
}

/// Failure to spawn one task. Recorded in the report, never propagated.
#[derive(Debug, Clone, Error)]
pub enum TaskSpawnError {
    /// The isolation provider failed.
    #[error(transparent)]
    Isolation(#[from] IsolationError),

    /// The execution backend failed.
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// The execution backend refused the spawn.
    #[error("spawn refused: {0}")]
    Refused(String),

    /// The prompt could not be rendered.
    #[error(transparent)]
    Prompt(#[from] PromptRenderError),
}

/// A successful spawn, ready to be recorded.
struct Launched {
    run: PreparedRun,
    resource: IsolationResource,
}

/// Outcome of reconciling one spawned assignment.
enum Reconciled {
    Completed(CompletionOutcome),
    Failed(FailureRecord),
    Running,
}

type Collaborators<'a> = (&'a Arc<dyn ExecutionBackend>, &'a Arc<dyn IsolationProvider>);

/// Spawns agents for ready tasks under a parent and tracks them to
/// completion.
///
/// The execution backend and isolation provider are attached with
/// [`Self::with_execution_backend`] and [`Self::with_isolation_provider`];
/// calls that need them fail with
/// [`OrchestrationError::MissingCollaborator`] until they are set.
pub struct ParallelOrchestrator<T, S, C>
where
    T: TaskStore,
    S: OrchestrationStateStore,
    C: Clock + Send + Sync,
{
    tasks: Arc<T>,
    resolver: TaskReadinessResolver<T>,
    states: Arc<S>,
    execution: Option<Arc<dyn ExecutionBackend>>,
    isolation: Option<Arc<dyn IsolationProvider>>,
    prompts: AgentPromptRenderer,
    config: OrchestrationConfig,
    gate: SessionGate,
    clock: Arc<C>,
}

impl<T, S, C> ParallelOrchestrator<T, S, C>
where
    T: TaskStore,
    S: OrchestrationStateStore,
    C: Clock + Send + Sync,
{
    /// Creates an orchestrator with no execution backend or isolation
    /// provider.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestrationError::Config`] when `config` is invalid.
    pub fn new(
        tasks: Arc<T>,
        states: Arc<S>,
        clock: Arc<C>,
        config: OrchestrationConfig,
    ) -> OrchestrationResult<Self> {
        config.validate()?;
        Ok(Self {
            resolver: TaskReadinessResolver::new(Arc::clone(&tasks)),
            tasks,
            states,
            execution: None,
            isolation: None,
            prompts: AgentPromptRenderer::new(config.prompt_template.as_str()),
            config,
            gate: SessionGate::new(),
            clock,
        })
    }

    /// Attaches the execution backend.
    #[must_use]
    pub fn with_execution_backend(mut self, backend: Arc<dyn ExecutionBackend>) -> Self {
        self.execution = Some(backend);
        self
    }

    /// Attaches the isolation provider.
    #[must_use]
    pub fn with_isolation_provider(mut self, provider: Arc<dyn IsolationProvider>) -> Self {
        self.isolation = Some(provider);
        self
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &OrchestrationConfig {
        &self.config
    }

    /// Spawns agents for ready tasks under `parent_task_id`, up to
    /// `max_concurrent` working at once for `parent_session_id`.
    ///
    /// Tasks already spawned or completed for the session are never spawned
    /// again; failed tasks may be retried. Candidates are tried in readiness
    /// order, one free slot per attempt, and one task's failure does not stop
    /// the others. Every successful spawn is persisted before the next
    /// candidate is tried.
    ///
    /// # Errors
    ///
    /// Fails without spawning anything when a collaborator is missing, and
    /// fails the call when the task store or state store fails.
    pub async fn orchestrate_ready_tasks(
        &self,
        parent_task_id: &TaskId,
        parent_session_id: SessionId,
        max_concurrent: u32,
    ) -> OrchestrationResult<OrchestrationReport> {
        let collaborators = self.collaborators()?;
        let _guard = self.gate.lock(parent_session_id).await;

        let mut state = self.load_state(parent_session_id).await?;
        let candidates = self.unassigned_ready(parent_task_id, &state).await?;
        let mut free_slots = usize::try_from(max_concurrent)
            .unwrap_or(usize::MAX)
            .saturating_sub(state.spawned_count());
        debug!(
            %parent_task_id,
            %parent_session_id,
            candidates = candidates.len(),
            free_slots,
            "orchestrating ready tasks"
        );

        let mut report = OrchestrationReport::default();
        for task in candidates {
            if free_slots == 0 {
                report.skip(task.id().clone(), CAPACITY_SKIP_REASON);
                continue;
            }
            // Each attempt takes a slot, whether or not it succeeds.
            free_slots -= 1;
            match self.spawn_task(&task, parent_session_id, collaborators).await {
                Ok(launched) => {
                    let spawned = self
                        .record_spawn(parent_session_id, &mut state, &task, launched)
                        .await?;
                    report.spawned.push(spawned);
                }
                Err(err) => {
                    warn!(task_id = %task.id(), error = %err, "failed to spawn agent");
                    report.errors.push(SpawnFailure {
                        task_id: task.id().clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        info!(
            %parent_session_id,
            spawned = report.spawned.len(),
            skipped = report.skipped.len(),
            errors = report.errors.len(),
            "orchestration pass finished"
        );
        Ok(report)
    }

    /// Reconciles every spawned assignment of `parent_session_id`.
    ///
    /// Closed tasks move to completed. Tasks whose agent left the running
    /// registry while still holding its claim move to failed and have the
    /// claim released. Everything else stays running. State is written once,
    /// and only when something changed.
    ///
    /// # Errors
    ///
    /// Fails when a collaborator is missing or the state store fails.
    pub async fn poll_agent_status(
        &self,
        parent_session_id: SessionId,
    ) -> OrchestrationResult<PollReport> {
        let (execution, isolation) = self.collaborators()?;
        let _guard = self.gate.lock(parent_session_id).await;

        let Some(mut state) = self.states.find(parent_session_id).await? else {
            return Ok(PollReport::idle());
        };
        let spawned: Vec<AgentAssignment> = state
            .spawned()
            .map(|tracked| tracked.assignment().clone())
            .collect();
        if spawned.is_empty() {
            return Ok(PollReport::idle());
        }

        let oracle = LivenessOracle::new(Arc::clone(execution), Arc::clone(isolation));
        let mut report = PollReport::default();
        let mut crashed = Vec::new();
        for assignment in spawned {
            match self.reconcile(&assignment, &oracle).await {
                Reconciled::Completed(outcome) => {
                    report.newly_completed.push(CompletedAgent {
                        session_id: assignment.session_id,
                        task_id: assignment.task_id.clone(),
                        commit_sha: outcome.commit_sha.clone(),
                    });
                    state.mark_completed(assignment.session_id, outcome)?;
                }
                Reconciled::Failed(record) => {
                    report.newly_failed.push(FailedAgent {
                        session_id: assignment.session_id,
                        task_id: assignment.task_id.clone(),
                        failure_reason: record.reason.clone(),
                    });
                    state.mark_failed(assignment.session_id, record)?;
                    crashed.push(assignment);
                }
                Reconciled::Running => report.still_running.push(RunningAgentSummary {
                    session_id: assignment.session_id,
                    task_id: assignment.task_id,
                    started_at: assignment.started_at,
                }),
            }
        }

        if report.has_transitions() {
            self.save_state(parent_session_id, &state).await?;
        }
        for assignment in &crashed {
            release_crashed_claim(isolation.as_ref(), assignment).await;
        }

        report.all_done = state.spawned_count() == 0;
        info!(
            %parent_session_id,
            completed = report.newly_completed.len(),
            failed = report.newly_failed.len(),
            running = report.still_running.len(),
            all_done = report.all_done,
            "agent poll finished"
        );
        Ok(report)
    }

    /// Returns a read-only progress snapshot for `parent_task_id`.
    ///
    /// # Errors
    ///
    /// Fails when the task store or state store fails.
    pub async fn orchestration_status(
        &self,
        parent_task_id: &TaskId,
        parent_session_id: SessionId,
    ) -> OrchestrationResult<OrchestrationStatus> {
        let state = self.load_state(parent_session_id).await?;
        let summary = self.resolver.subtree_summary(parent_task_id).await?;
        let ready_unassigned = self.unassigned_ready(parent_task_id, &state).await?.len();
        Ok(OrchestrationStatus {
            open: summary.count(TaskStatus::Open),
            in_progress: summary.count(TaskStatus::InProgress),
            review: summary.count(TaskStatus::Review),
            closed: summary.count(TaskStatus::Closed),
            escalated: summary.count(TaskStatus::Escalated),
            ready_unassigned,
            spawned: state.spawned_count(),
            completed: state.completed_count(),
            failed: state.failed_count(),
        })
    }

    fn collaborators(&self) -> OrchestrationResult<Collaborators<'_>> {
        let execution = self
            .execution
            .as_ref()
            .ok_or(OrchestrationError::MissingCollaborator("execution backend"))?;
        let isolation = self
            .isolation
            .as_ref()
            .ok_or(OrchestrationError::MissingCollaborator("isolation provider"))?;
        Ok((execution, isolation))
    }

    async fn load_state(&self, session_id: SessionId) -> OrchestrationResult<OrchestrationState> {
        Ok(self.states.find(session_id).await?.unwrap_or_default())
    }

    async fn save_state(
        &self,
        session_id: SessionId,
        state: &OrchestrationState,
    ) -> OrchestrationResult<()> {
        self.states.save(session_id, state).await.map_err(|err| {
            error!(%session_id, error = %err, "failed to persist orchestration state");
            OrchestrationError::from(err)
        })
    }

    async fn unassigned_ready(
        &self,
        parent_task_id: &TaskId,
        state: &OrchestrationState,
    ) -> OrchestrationResult<Vec<Task>> {
        let ready = self.resolver.list_ready_descendants(parent_task_id).await?;
        Ok(ready
            .into_iter()
            .filter(|task| !state.is_assigned_or_done(task.id()))
            .collect())
    }

    async fn record_spawn(
        &self,
        parent_session_id: SessionId,
        state: &mut OrchestrationState,
        task: &Task,
        launched: Launched,
    ) -> OrchestrationResult<SpawnedAgent> {
        let assignment = AgentAssignment::new(
            launched.run.session_id,
            task.id().clone(),
            launched.resource.id.clone(),
            self.clock.as_ref(),
        );
        if let Some(superseded) = state.record_spawn(assignment)? {
            info!(
                task_id = %task.id(),
                previous_session_id = %superseded.session_id(),
                "retrying previously failed task"
            );
        }
        self.save_state(parent_session_id, state).await?;
        info!(
            task_id = %task.id(),
            session_id = %launched.run.session_id,
            resource_id = %launched.resource.id,
            "spawned agent"
        );
        Ok(SpawnedAgent {
            task_id: task.id().clone(),
            session_id: launched.run.session_id,
            isolation_resource_id: launched.resource.id,
            branch: launched.resource.branch,
        })
    }

    async fn spawn_task(
        &self,
        task: &Task,
        parent_session_id: SessionId,
        (execution, isolation): Collaborators<'_>,
    ) -> Result<Launched, TaskSpawnError> {
        let (resource, created) = self.acquire_resource(task, isolation.as_ref()).await?;
        let launched = self
            .launch(task, parent_session_id, &resource, execution.as_ref(), isolation.as_ref())
            .await;
        if launched.is_err() && created {
            if let Err(err) = isolation.mark_abandoned(&resource.id).await {
                warn!(
                    task_id = %task.id(),
                    resource_id = %resource.id,
                    error = %err,
                    "failed to abandon isolation resource"
                );
            }
        }
        launched.map(|run| Launched { run, resource })
    }

    async fn acquire_resource(
        &self,
        task: &Task,
        isolation: &dyn IsolationProvider,
    ) -> Result<(IsolationResource, bool), TaskSpawnError> {
        if let Some(existing) = isolation.find_by_task(task.id()).await? {
            if existing.is_active() {
                debug!(task_id = %task.id(), resource_id = %existing.id, "reusing isolation resource");
                return Ok((existing, false));
            }
        }
        let request = IsolationRequest {
            task_id: task.id().clone(),
            branch: branch_name(&self.config.branch_prefix, task.id()),
            base_branch: self.config.base_branch.clone(),
        };
        let created = isolation.create(&request).await?;
        Ok((created, true))
    }

    async fn launch(
        &self,
        task: &Task,
        parent_session_id: SessionId,
        resource: &IsolationResource,
        execution: &dyn ExecutionBackend,
        isolation: &dyn IsolationProvider,
    ) -> Result<PreparedRun, TaskSpawnError> {
        let capacity = execution.can_spawn(parent_session_id).await?;
        if !capacity.is_allowed() {
            let reason = capacity.reason().unwrap_or("agent depth limit reached");
            return Err(TaskSpawnError::Refused(reason.to_owned()));
        }
        let prompt = self.prompts.render(task, resource, parent_session_id)?;
        let request = RunRequest {
            parent_session_id,
            task_id: task.id().clone(),
            project_id: task.project_id().map(str::to_owned),
            prompt,
            workdir: resource.path.clone(),
            branch: resource.branch.clone(),
            provider: self.config.agent_provider.clone(),
            mode: self.config.agent_mode,
            agent_depth: capacity.depth().saturating_add(1),
        };
        let run = execution.prepare_run(&request).await?;

        if let Err(err) = isolation.claim(&resource.id, run.session_id).await {
            abandon_run(execution, &run, "isolation claim failed").await;
            return Err(err.into());
        }
        if let Err(err) = execution.dispatch(&run).await {
            if let Err(release_err) = isolation.release(&resource.id, run.session_id).await {
                warn!(
                    resource_id = %resource.id,
                    session_id = %run.session_id,
                    error = %release_err,
                    "failed to release claim after dispatch failure"
                );
            }
            abandon_run(execution, &run, "dispatch failed").await;
            return Err(err.into());
        }
        Ok(run)
    }

    async fn reconcile(&self, assignment: &AgentAssignment, oracle: &LivenessOracle) -> Reconciled {
        let task = match self.tasks.find_by_id(&assignment.task_id).await {
            Ok(Some(task)) => task,
            Ok(None) => {
                warn!(task_id = %assignment.task_id, "assigned task missing from store; keeping it running");
                return Reconciled::Running;
            }
            Err(err) => {
                warn!(task_id = %assignment.task_id, error = %err, "task lookup failed; keeping it running");
                return Reconciled::Running;
            }
        };
        if task.status().is_closed() {
            return Reconciled::Completed(CompletionOutcome::from_task(&task, self.clock.as_ref()));
        }
        match oracle.classify(assignment).await {
            Liveness::Crashed => Reconciled::Failed(FailureRecord::new(
                EXITED_WITHOUT_COMPLETING,
                self.clock.as_ref(),
            )),
            Liveness::Running => Reconciled::Running,
        }
    }
}

/// Builds the branch name for a task, keeping only branch-safe characters.
#[must_use]
pub fn branch_name(prefix: &str, task_id: &TaskId) -> String {
    let slug: String = task_id
        .as_str()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    format!("{prefix}{slug}")
}

async fn abandon_run(execution: &dyn ExecutionBackend, run: &PreparedRun, reason: &str) {
    if let Err(err) = execution.abandon_run(run, reason).await {
        warn!(
            session_id = %run.session_id,
            run_id = %run.run_id,
            error = %err,
            "failed to abandon agent run"
        );
    }
}

async fn release_crashed_claim(isolation: &dyn IsolationProvider, assignment: &AgentAssignment) {
    match isolation
        .release(&assignment.isolation_resource_id, assignment.session_id)
        .await
    {
        Ok(()) => debug!(
            session_id = %assignment.session_id,
            resource_id = %assignment.isolation_resource_id,
            "released claim of crashed agent"
        ),
        Err(err) => warn!(
            session_id = %assignment.session_id,
            resource_id = %assignment.isolation_resource_id,
            error = %err,
            "failed to release claim of crashed agent"
        ),
    }
}
