//! Crash detection for spawned agents.
//!
//! No heartbeats exist. An agent is judged crashed only when two independent
//! signals agree: the backend no longer tracks its process, and its
//! isolation resource is still claimed by its session. A clean exit releases
//! the claim; a crash leaves it behind.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::orchestration::{
    domain::{AgentAssignment, IsolationResourceId},
    ports::{ExecutionBackend, IsolationProvider},
};
use crate::workflow::domain::SessionId;

/// Claim held on an isolation resource, as seen by one lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimStatus {
    /// The session still owns the resource.
    Claimed,
    /// The resource is owned by nobody, by someone else, or is gone.
    Released,
    /// The lookup failed.
    Unknown,
}

/// Liveness verdict for one assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Treat the agent as still working.
    Running,
    /// The agent exited without releasing its claim.
    Crashed,
}

/// Combines the execution backend and isolation provider signals.
#[derive(Clone)]
pub struct LivenessOracle {
    execution: Arc<dyn ExecutionBackend>,
    isolation: Arc<dyn IsolationProvider>,
}

impl LivenessOracle {
    /// Creates an oracle over both collaborators.
    #[must_use]
    pub fn new(execution: Arc<dyn ExecutionBackend>, isolation: Arc<dyn IsolationProvider>) -> Self {
        Self {
            execution,
            isolation,
        }
    }

    /// Returns `true` when the backend registry tracks the session.
    ///
    /// A failed registry read counts as alive.
    pub async fn is_alive(&self, session_id: SessionId) -> bool {
        match self.execution.running_agent(session_id).await {
            Ok(agent) => agent.is_some(),
            Err(err) => {
                warn!(%session_id, error = %err, "running-agent lookup failed; assuming alive");
                true
            }
        }
    }

    /// Reports whether `session_id` still owns `resource_id`.
    pub async fn claim_status(
        &self,
        resource_id: &IsolationResourceId,
        session_id: SessionId,
    ) -> ClaimStatus {
        match self.isolation.get(resource_id).await {
            Ok(Some(resource)) if resource.is_claimed_by(session_id) => ClaimStatus::Claimed,
            Ok(_) => ClaimStatus::Released,
            Err(err) => {
                warn!(
                    %session_id,
                    resource_id = %resource_id,
                    error = %err,
                    "isolation lookup failed; claim status unknown"
                );
                ClaimStatus::Unknown
            }
        }
    }

    /// Returns `true` only for a confirmed claim.
    pub async fn resource_still_claimed(
        &self,
        resource_id: &IsolationResourceId,
        session_id: SessionId,
    ) -> bool {
        self.claim_status(resource_id, session_id).await == ClaimStatus::Claimed
    }

    /// Classifies an assignment whose task is not closed.
    ///
    /// Only "not alive and still claimed" is a crash. Every other
    /// combination, including any ambiguous read, keeps the agent running.
    pub async fn classify(&self, assignment: &AgentAssignment) -> Liveness {
        if self.is_alive(assignment.session_id).await {
            return Liveness::Running;
        }
        let claim = self
            .claim_status(&assignment.isolation_resource_id, assignment.session_id)
            .await;
        debug!(
            session_id = %assignment.session_id,
            task_id = %assignment.task_id,
            ?claim,
            "agent not in running registry"
        );
        match claim {
            ClaimStatus::Claimed => Liveness::Crashed,
            ClaimStatus::Released | ClaimStatus::Unknown => Liveness::Running,
        }
    }
}
