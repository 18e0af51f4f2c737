//! Tool-call surface of the orchestrator.
//!
//! Parent agents call the orchestrator as tools with JSON arguments. Each
//! response carries a `success` flag; failures are reported in `error`
//! rather than raised, so a bad call never takes the caller down.

use std::sync::Arc;

use mockable::Clock;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};

use crate::orchestration::{
    domain::{OrchestrationReport, OrchestrationStatus, PollReport},
    ports::OrchestrationStateStore,
    services::ParallelOrchestrator,
};
use crate::task::{domain::TaskId, ports::TaskStore};
use crate::workflow::domain::SessionId;

/// Tool name of [`OrchestrationTools::orchestrate_ready_tasks`].
pub const ORCHESTRATE_READY_TASKS: &str = "orchestrate_ready_tasks";
/// Tool name of [`OrchestrationTools::poll_agent_status`].
pub const POLL_AGENT_STATUS: &str = "poll_agent_status";
/// Tool name of [`OrchestrationTools::orchestration_status`].
pub const ORCHESTRATION_STATUS: &str = "orchestration_status";

/// Arguments of `orchestrate_ready_tasks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestrateReadyTasksParams {
    /// Parent task whose subtree is scheduled.
    pub parent_task_id: String,
    /// Orchestrating session.
    pub parent_session_id: String,
    /// Concurrency cap; the configured default applies when absent.
    #[serde(default)]
    pub max_concurrent: Option<u32>,
}

/// Arguments of `poll_agent_status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollAgentStatusParams {
    /// Orchestrating session.
    pub parent_session_id: String,
}

/// Arguments of `orchestration_status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestrationStatusParams {
    /// Parent task whose subtree is summarised.
    pub parent_task_id: String,
    /// Orchestrating session.
    pub parent_session_id: String,
}

/// Spawned agent entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnedEntry {
    /// Task worked on.
    pub task_id: String,
    /// Session of the new agent.
    pub session_id: String,
    /// Isolation resource of the agent.
    pub isolation_resource_id: String,
    /// Branch of the isolation resource.
    pub branch: String,
}

/// Skipped task entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    /// Skipped task.
    pub task_id: String,
    /// Why it was skipped.
    pub reason: String,
}

/// Failed spawn entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnErrorEntry {
    /// Task that could not be spawned.
    pub task_id: String,
    /// Failure description.
    pub error: String,
}

/// Response of `orchestrate_ready_tasks`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestrateReadyTasksResponse {
    /// `false` when the whole call failed.
    pub success: bool,
    /// Number of agents spawned.
    pub spawned_count: usize,
    /// Number of ready tasks skipped.
    pub skipped_count: usize,
    /// Agents spawned.
    pub spawned: Vec<SpawnedEntry>,
    /// Tasks skipped.
    pub skipped: Vec<SkippedEntry>,
    /// Per-task spawn failures.
    pub errors: Vec<SpawnErrorEntry>,
    /// Call-level failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<OrchestrationReport> for OrchestrateReadyTasksResponse {
    fn from(report: OrchestrationReport) -> Self {
        Self {
            success: true,
            spawned_count: report.spawned.len(),
            skipped_count: report.skipped.len(),
            spawned: report
                .spawned
                .into_iter()
                .map(|agent| SpawnedEntry {
                    task_id: agent.task_id.to_string(),
                    session_id: agent.session_id.to_string(),
                    isolation_resource_id: agent.isolation_resource_id.to_string(),
                    branch: agent.branch,
                })
                .collect(),
            skipped: report
                .skipped
                .into_iter()
                .map(|skipped| SkippedEntry {
                    task_id: skipped.task_id.to_string(),
                    reason: skipped.reason,
                })
                .collect(),
            errors: report
                .errors
                .into_iter()
                .map(|failure| SpawnErrorEntry {
                    task_id: failure.task_id.to_string(),
                    error: failure.error,
                })
                .collect(),
            error: None,
        }
    }
}

/// Completed agent entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedEntry {
    /// Session of the agent.
    pub session_id: String,
    /// Completed task.
    pub task_id: String,
    /// Commit that closed the task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_sha: Option<String>,
}

/// Failed agent entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedEntry {
    /// Session of the agent.
    pub session_id: String,
    /// Unfinished task.
    pub task_id: String,
    /// Failure reason.
    pub failure_reason: String,
}

/// Running agent entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningEntry {
    /// Session of the agent.
    pub session_id: String,
    /// Task being worked on.
    pub task_id: String,
    /// RFC 3339 spawn time.
    pub started_at: String,
}

/// Response of `poll_agent_status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollAgentStatusResponse {
    /// `false` when the whole call failed.
    pub success: bool,
    /// Agents completed during this poll.
    pub newly_completed: Vec<CompletedEntry>,
    /// Agents failed during this poll.
    pub newly_failed: Vec<FailedEntry>,
    /// Agents still working.
    pub still_running: Vec<RunningEntry>,
    /// `true` when nothing is left in flight.
    pub all_done: bool,
    /// Call-level failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<PollReport> for PollAgentStatusResponse {
    fn from(report: PollReport) -> Self {
        Self {
            success: true,
            newly_completed: report
                .newly_completed
                .into_iter()
                .map(|agent| CompletedEntry {
                    session_id: agent.session_id.to_string(),
                    task_id: agent.task_id.to_string(),
                    commit_sha: agent.commit_sha,
                })
                .collect(),
            newly_failed: report
                .newly_failed
                .into_iter()
                .map(|agent| FailedEntry {
                    session_id: agent.session_id.to_string(),
                    task_id: agent.task_id.to_string(),
                    failure_reason: agent.failure_reason,
                })
                .collect(),
            still_running: report
                .still_running
                .into_iter()
                .map(|agent| RunningEntry {
                    session_id: agent.session_id.to_string(),
                    task_id: agent.task_id.to_string(),
                    started_at: agent.started_at.to_rfc3339(),
                })
                .collect(),
            all_done: report.all_done,
            error: None,
        }
    }
}

/// Response of `orchestration_status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestrationStatusResponse {
    /// `false` when the whole call failed.
    pub success: bool,
    /// Subtree tasks that are open.
    pub open: usize,
    /// Subtree tasks in progress.
    pub in_progress: usize,
    /// Subtree tasks in review.
    pub review: usize,
    /// Subtree tasks closed.
    pub closed: usize,
    /// Subtree tasks escalated.
    pub escalated: usize,
    /// Tasks in the subtree.
    pub total_tasks: usize,
    /// Ready tasks with no agent yet.
    pub ready_unassigned: usize,
    /// Agents working.
    pub spawned: usize,
    /// Agents completed.
    pub completed: usize,
    /// Agents failed.
    pub failed: usize,
    /// Call-level failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<OrchestrationStatus> for OrchestrationStatusResponse {
    fn from(status: OrchestrationStatus) -> Self {
        Self {
            success: true,
            open: status.open,
            in_progress: status.in_progress,
            review: status.review,
            closed: status.closed,
            escalated: status.escalated,
            total_tasks: status.total_tasks(),
            ready_unassigned: status.ready_unassigned,
            spawned: status.spawned,
            completed: status.completed,
            failed: status.failed,
            error: None,
        }
    }
}

/// Response types that can report a call-level failure.
trait FailureResponse: Default {
    fn failure(error: String) -> Self;
}

macro_rules! failure_response {
    ($($response:ty),+ $(,)?) => {
        $(impl FailureResponse for $response {
            fn failure(error: String) -> Self {
                Self {
                    success: false,
                    error: Some(error),
                    ..Self::default()
                }
            }
        })+
    };
}

failure_response!(
    OrchestrateReadyTasksResponse,
    PollAgentStatusResponse,
    OrchestrationStatusResponse,
);

/// JSON tool adapter over a [`ParallelOrchestrator`].
pub struct OrchestrationTools<T, S, C>
where
    T: TaskStore,
    S: OrchestrationStateStore,
    C: Clock + Send + Sync,
{
    orchestrator: Arc<ParallelOrchestrator<T, S, C>>,
}

impl<T, S, C> Clone for OrchestrationTools<T, S, C>
where
    T: TaskStore,
    S: OrchestrationStateStore,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            orchestrator: Arc::clone(&self.orchestrator),
        }
    }
}

impl<T, S, C> OrchestrationTools<T, S, C>
where
    T: TaskStore,
    S: OrchestrationStateStore,
    C: Clock + Send + Sync,
{
    /// Wraps an orchestrator.
    #[must_use]
    pub const fn new(orchestrator: Arc<ParallelOrchestrator<T, S, C>>) -> Self {
        Self { orchestrator }
    }

    /// Spawns agents for ready tasks.
    pub async fn orchestrate_ready_tasks(
        &self,
        params: &OrchestrateReadyTasksParams,
    ) -> OrchestrateReadyTasksResponse {
        let (parent_task_id, parent_session_id) =
            match parse_ids(&params.parent_task_id, &params.parent_session_id) {
                Ok(ids) => ids,
                Err(error) => return OrchestrateReadyTasksResponse::failure(error),
            };
        let max_concurrent = params
            .max_concurrent
            .unwrap_or(self.orchestrator.config().default_max_concurrent);
        self.orchestrator
            .orchestrate_ready_tasks(&parent_task_id, parent_session_id, max_concurrent)
            .await
            .map_or_else(
                |err| OrchestrateReadyTasksResponse::failure(err.to_string()),
                OrchestrateReadyTasksResponse::from,
            )
    }

    /// Reconciles spawned agents.
    pub async fn poll_agent_status(&self, params: &PollAgentStatusParams) -> PollAgentStatusResponse {
        let parent_session_id = match parse_session(&params.parent_session_id) {
            Ok(id) => id,
            Err(error) => return PollAgentStatusResponse::failure(error),
        };
        self.orchestrator
            .poll_agent_status(parent_session_id)
            .await
            .map_or_else(
                |err| PollAgentStatusResponse::failure(err.to_string()),
                PollAgentStatusResponse::from,
            )
    }

    /// Summarises progress under a parent task.
    pub async fn orchestration_status(
        &self,
        params: &OrchestrationStatusParams,
    ) -> OrchestrationStatusResponse {
        let (parent_task_id, parent_session_id) =
            match parse_ids(&params.parent_task_id, &params.parent_session_id) {
                Ok(ids) => ids,
                Err(error) => return OrchestrationStatusResponse::failure(error),
            };
        self.orchestrator
            .orchestration_status(&parent_task_id, parent_session_id)
            .await
            .map_or_else(
                |err| OrchestrationStatusResponse::failure(err.to_string()),
                OrchestrationStatusResponse::from,
            )
    }

    /// Invokes a tool by name with JSON arguments and returns its JSON
    /// response.
    pub async fn call(&self, tool_name: &str, arguments: Value) -> Value {
        match tool_name {
            ORCHESTRATE_READY_TASKS => match decode::<OrchestrateReadyTasksParams>(arguments) {
                Ok(params) => to_json(&self.orchestrate_ready_tasks(&params).await),
                Err(error) => to_json(&OrchestrateReadyTasksResponse::failure(error)),
            },
            POLL_AGENT_STATUS => match decode::<PollAgentStatusParams>(arguments) {
                Ok(params) => to_json(&self.poll_agent_status(&params).await),
                Err(error) => to_json(&PollAgentStatusResponse::failure(error)),
            },
            ORCHESTRATION_STATUS => match decode::<OrchestrationStatusParams>(arguments) {
                Ok(params) => to_json(&self.orchestration_status(&params).await),
                Err(error) => to_json(&OrchestrationStatusResponse::failure(error)),
            },
            unknown => json!({
                "success": false,
                "error": format!("unknown tool: {unknown}"),
            }),
        }
    }
}

fn parse_ids(task_id: &str, session_id: &str) -> Result<(TaskId, SessionId), String> {
    let parent_task_id = TaskId::new(task_id).map_err(|err| format!("invalid parent_task_id: {err}"))?;
    Ok((parent_task_id, parse_session(session_id)?))
}

fn parse_session(raw: &str) -> Result<SessionId, String> {
    raw.trim()
        .parse()
        .map_err(|err| format!("invalid parent_session_id: {err}"))
}

fn decode<P: DeserializeOwned>(arguments: Value) -> Result<P, String> {
    serde_json::from_value(arguments).map_err(|err| format!("invalid arguments: {err}"))
}

fn to_json<R: Serialize>(response: &R) -> Value {
    serde_json::to_value(response).unwrap_or_else(|err| {
        json!({
            "success": false,
            "error": format!("failed to encode response: {err}"),
        })
    })
}
