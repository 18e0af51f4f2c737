//! Upgrades older orchestration snapshots to the current schema.

use super::VersionedSnapshot;
use crate::orchestration::domain::{
    AgentAssignment, AssignmentStatus, CompletionOutcome, FailureRecord, IsolationResourceId,
    OrchestrationState, TrackedAssignment,
};
use crate::orchestration::ports::{StateStoreError, StateStoreResult};
use crate::task::domain::TaskId;
use crate::workflow::domain::SessionId;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;

/// Upgrader for orchestration snapshots.
///
/// - v1 → v2: the three untyped agent lists become one list of tracked
///   assignments. Timestamps missing from v1 entries fall back to the time
///   the workflow state was last written.
#[derive(Debug, Clone, Copy)]
pub struct StateUpgrader {
    fallback_time: DateTime<Utc>,
}

/// Agent entry as written by the schema 1 layout.
#[derive(Debug, Deserialize)]
struct LegacyAgentEntry {
    session_id: SessionId,
    task_id: TaskId,
    worktree_id: String,
    #[serde(default)]
    started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    closed_reason: Option<String>,
    #[serde(default)]
    commit_sha: Option<String>,
    #[serde(default)]
    failed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    failure_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LegacyLists {
    #[serde(default)]
    spawned_agents: Vec<LegacyAgentEntry>,
    #[serde(default)]
    completed_agents: Vec<LegacyAgentEntry>,
    #[serde(default)]
    failed_agents: Vec<LegacyAgentEntry>,
}

impl StateUpgrader {
    /// The current schema version.
    pub const CURRENT_VERSION: u32 = 2;

    /// Supported schema versions.
    const SUPPORTED_VERSIONS: &'static [u32] = &[1, 2];

    /// Creates an upgrader using `fallback_time` for missing timestamps.
    #[must_use]
    pub const fn new(fallback_time: DateTime<Utc>) -> Self {
        Self { fallback_time }
    }

    /// Returns `true` if this upgrader can read the given version.
    #[must_use]
    pub fn supports_version(version: u32) -> bool {
        Self::SUPPORTED_VERSIONS.contains(&version)
    }

    /// Upgrades a snapshot to [`Self::CURRENT_VERSION`].
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError::UnsupportedSchemaVersion`] for unknown
    /// versions and [`StateStoreError::Decode`] for malformed payloads.
    pub fn upgrade(&self, snapshot: VersionedSnapshot) -> StateStoreResult<VersionedSnapshot> {
        match snapshot.schema_version() {
            1 => self.upgrade_v1_to_v2(snapshot.state()),
            Self::CURRENT_VERSION => Ok(snapshot),
            version => Err(StateStoreError::UnsupportedSchemaVersion(version)),
        }
    }

    /// Upgrades and decodes a snapshot in one step.
    ///
    /// # Errors
    ///
    /// See [`Self::upgrade`] and [`VersionedSnapshot::into_state`].
    pub fn decode(&self, snapshot: VersionedSnapshot) -> StateStoreResult<OrchestrationState> {
        self.upgrade(snapshot)?.into_state()
    }

    fn upgrade_v1_to_v2(&self, payload: &Value) -> StateStoreResult<VersionedSnapshot> {
        let lists = LegacyLists::deserialize(payload).map_err(StateStoreError::decode)?;

        let mut assignments = Vec::new();
        for entry in lists.spawned_agents {
            let tracked = self.tracked(entry, |_| AssignmentStatus::Spawned)?;
            assignments.push(tracked);
        }
        for entry in lists.completed_agents {
            let tracked = self.tracked(entry, |legacy| {
                AssignmentStatus::Completed(CompletionOutcome {
                    completed_at: legacy.completed_at.unwrap_or(self.fallback_time),
                    closed_at: legacy.closed_at,
                    closed_reason: legacy.closed_reason.clone(),
                    commit_sha: legacy.commit_sha.clone(),
                })
            })?;
            assignments.push(tracked);
        }

        // Schema 1 kept failed entries around when a task was retried.
        let occupied: HashSet<TaskId> = assignments
            .iter()
            .map(|tracked| tracked.task_id().clone())
            .collect();
        for entry in lists.failed_agents {
            if occupied.contains(&entry.task_id) {
                continue;
            }
            let tracked = self.tracked(entry, |legacy| {
                AssignmentStatus::Failed(FailureRecord {
                    failed_at: legacy.failed_at.unwrap_or(self.fallback_time),
                    reason: legacy
                        .failure_reason
                        .clone()
                        .unwrap_or_else(|| "unknown failure".to_owned()),
                })
            })?;
            assignments.push(tracked);
        }

        let state = OrchestrationState::from_assignments(assignments)?;
        VersionedSnapshot::encode(Self::CURRENT_VERSION, &state)
    }

    fn tracked(
        &self,
        entry: LegacyAgentEntry,
        status: impl FnOnce(&LegacyAgentEntry) -> AssignmentStatus,
    ) -> StateStoreResult<TrackedAssignment> {
        let next_status = status(&entry);
        let isolation_resource_id = IsolationResourceId::new(entry.worktree_id)?;
        let assignment = AgentAssignment {
            session_id: entry.session_id,
            task_id: entry.task_id,
            isolation_resource_id,
            started_at: entry.started_at.unwrap_or(self.fallback_time),
        };
        Ok(TrackedAssignment::new(assignment, next_status))
    }
}
