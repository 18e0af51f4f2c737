//! `PostgreSQL` repository implementation for workflow state storage.

use super::{
    models::{NewWorkflowStateRow, WorkflowStateRow},
    schema::workflow_states,
};
use crate::workflow::{
    domain::{PersistedWorkflowData, SessionId, WorkflowState},
    ports::{WorkflowStateError, WorkflowStateRepository, WorkflowStateResult},
};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use serde_json::Value;

/// `PostgreSQL` connection pool type used by workflow adapters.
pub type WorkflowPgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed workflow state repository.
#[derive(Debug, Clone)]
pub struct PostgresWorkflowStateRepository {
    pool: WorkflowPgPool,
}

impl PostgresWorkflowStateRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: WorkflowPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> WorkflowStateResult<T>
    where
        F: FnOnce(&mut PgConnection) -> WorkflowStateResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(WorkflowStateError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(WorkflowStateError::persistence)?
    }
}

#[async_trait]
impl WorkflowStateRepository for PostgresWorkflowStateRepository {
    async fn find(&self, session_id: SessionId) -> WorkflowStateResult<Option<WorkflowState>> {
        self.run_blocking(move |connection| {
            let row = workflow_states::table
                .filter(workflow_states::session_id.eq(session_id.into_inner()))
                .select(WorkflowStateRow::as_select())
                .first::<WorkflowStateRow>(connection)
                .optional()
                .map_err(WorkflowStateError::persistence)?;
            row.map(row_to_state).transpose()
        })
        .await
    }

    async fn save(&self, state: &WorkflowState) -> WorkflowStateResult<()> {
        let row = to_new_row(state);
        self.run_blocking(move |connection| {
            diesel::insert_into(workflow_states::table)
                .values(&row)
                .on_conflict(workflow_states::session_id)
                .do_update()
                .set(&row)
                .execute(connection)
                .map_err(WorkflowStateError::persistence)?;
            Ok(())
        })
        .await
    }
}

pub(super) fn to_new_row(state: &WorkflowState) -> NewWorkflowStateRow {
    NewWorkflowStateRow {
        session_id: state.session_id().into_inner(),
        workflow_name: state.workflow_name().to_owned(),
        step: state.step().to_owned(),
        variables: Value::Object(state.variables().clone()),
        step_entered_at: state.step_entered_at(),
        updated_at: state.updated_at(),
    }
}

pub(super) fn row_to_state(row: WorkflowStateRow) -> WorkflowStateResult<WorkflowState> {
    let WorkflowStateRow {
        session_id,
        workflow_name,
        step,
        variables,
        step_entered_at,
        updated_at,
    } = row;

    let Value::Object(variables) = variables else {
        return Err(WorkflowStateError::invalid_persisted_data(
            std::io::Error::other(format!(
                "variables of session {session_id} are not a JSON object"
            )),
        ));
    };

    Ok(WorkflowState::from_persisted(PersistedWorkflowData {
        session_id: SessionId::from_uuid(session_id),
        workflow_name,
        step,
        variables,
        step_entered_at,
        updated_at,
    }))
}
