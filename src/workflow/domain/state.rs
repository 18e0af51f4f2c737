//! Workflow state record owned by one session.

use super::SessionId;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Persisted workflow position and variables of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    session_id: SessionId,
    workflow_name: String,
    step: String,
    variables: Map<String, Value>,
    step_entered_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing persisted workflow state.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedWorkflowData {
    /// Owning session.
    pub session_id: SessionId,
    /// Workflow name.
    pub workflow_name: String,
    /// Current step.
    pub step: String,
    /// Workflow variables.
    pub variables: Map<String, Value>,
    /// When the current step was entered.
    pub step_entered_at: DateTime<Utc>,
    /// Last write timestamp.
    pub updated_at: DateTime<Utc>,
}

impl WorkflowState {
    /// Creates a workflow state positioned at `step` with no variables.
    #[must_use]
    pub fn new(
        session_id: SessionId,
        workflow_name: impl Into<String>,
        step: impl Into<String>,
        clock: &impl Clock,
    ) -> Self {
        let now = clock.utc();
        Self {
            session_id,
            workflow_name: workflow_name.into(),
            step: step.into(),
            variables: Map::new(),
            step_entered_at: now,
            updated_at: now,
        }
    }

    /// Reconstructs workflow state from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedWorkflowData) -> Self {
        Self {
            session_id: data.session_id,
            workflow_name: data.workflow_name,
            step: data.step,
            variables: data.variables,
            step_entered_at: data.step_entered_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the owning session.
    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Returns the workflow name.
    #[must_use]
    pub fn workflow_name(&self) -> &str {
        &self.workflow_name
    }

    /// Returns the current step.
    #[must_use]
    pub fn step(&self) -> &str {
        &self.step
    }

    /// Returns all variables.
    #[must_use]
    pub const fn variables(&self) -> &Map<String, Value> {
        &self.variables
    }

    /// Returns one variable, if set.
    #[must_use]
    pub fn variable(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    /// Returns when the current step was entered.
    #[must_use]
    pub const fn step_entered_at(&self) -> DateTime<Utc> {
        self.step_entered_at
    }

    /// Returns the last write timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Moves to a new step. Re-entering the current step is a no-op.
    pub fn enter_step(&mut self, step: impl Into<String>, clock: &impl Clock) {
        let next = step.into();
        if next == self.step {
            return;
        }
        self.step = next;
        self.step_entered_at = clock.utc();
        self.updated_at = self.step_entered_at;
    }

    /// Sets a variable, returning the previous value.
    pub fn set_variable(
        &mut self,
        key: impl Into<String>,
        value: Value,
        clock: &impl Clock,
    ) -> Option<Value> {
        self.updated_at = clock.utc();
        self.variables.insert(key.into(), value)
    }

    /// Removes a variable, returning its value.
    pub fn remove_variable(&mut self, key: &str, clock: &impl Clock) -> Option<Value> {
        let removed = self.variables.remove(key);
        if removed.is_some() {
            self.updated_at = clock.utc();
        }
        removed
    }
}
