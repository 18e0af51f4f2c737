//! Diesel schema for workflow state persistence.

diesel::table! {
    /// One workflow state record per agent session.
    workflow_states (session_id) {
        /// Owning session identifier.
        session_id -> Uuid,
        /// Workflow name.
        #[max_length = 255]
        workflow_name -> Varchar,
        /// Current workflow step.
        #[max_length = 255]
        step -> Varchar,
        /// Workflow variables document.
        variables -> Jsonb,
        /// When the current step was entered.
        step_entered_at -> Timestamptz,
        /// Last write timestamp.
        updated_at -> Timestamptz,
    }
}
