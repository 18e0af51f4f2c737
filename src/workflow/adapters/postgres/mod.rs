//! `PostgreSQL` adapters for workflow state persistence.

mod models;
mod repository;
mod schema;

pub use repository::{PostgresWorkflowStateRepository, WorkflowPgPool};
