//! Diesel row models for workflow state persistence.

use super::schema::workflow_states;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for workflow state records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = workflow_states)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct WorkflowStateRow {
    /// Owning session identifier.
    pub session_id: uuid::Uuid,
    /// Workflow name.
    pub workflow_name: String,
    /// Current workflow step.
    pub step: String,
    /// Workflow variables document.
    pub variables: Value,
    /// When the current step was entered.
    pub step_entered_at: DateTime<Utc>,
    /// Last write timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert and update model for workflow state records.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = workflow_states)]
#[diesel(primary_key(session_id))]
pub struct NewWorkflowStateRow {
    /// Owning session identifier.
    pub session_id: uuid::Uuid,
    /// Workflow name.
    pub workflow_name: String,
    /// Current workflow step.
    pub step: String,
    /// Workflow variables document.
    pub variables: Value,
    /// When the current step was entered.
    pub step_entered_at: DateTime<Utc>,
    /// Last write timestamp.
    pub updated_at: DateTime<Utc>,
}
