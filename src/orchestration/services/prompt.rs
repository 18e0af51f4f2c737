//! Agent prompt rendering.

use minijinja::Environment;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::orchestration::ports::IsolationResource;
use crate::task::domain::Task;
use crate::workflow::domain::SessionId;

/// Error returned when a prompt cannot be rendered.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to render prompt for task {task_id}: {reason}")]
pub struct PromptRenderError {
    /// Task whose prompt failed.
    pub task_id: String,
    /// Renderer message.
    pub reason: String,
}

/// Renders the prompt handed to each spawned agent.
///
/// Templates see `task_id`, `title`, `description`, `priority`,
/// `task_type`, `branch`, `base_branch`, `workdir` and
/// `parent_session_id`.
#[derive(Debug, Clone)]
pub struct AgentPromptRenderer {
    template: String,
}

impl AgentPromptRenderer {
    /// Creates a renderer for `template`.
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Renders the prompt for `task` working in `resource`.
    ///
    /// # Errors
    ///
    /// Returns [`PromptRenderError`] when the template fails to render.
    pub fn render(
        &self,
        task: &Task,
        resource: &IsolationResource,
        parent_session_id: SessionId,
    ) -> Result<String, PromptRenderError> {
        let environment = Environment::new();
        let context = build_prompt_context(task, resource, parent_session_id);
        environment
            .render_str(&self.template, context)
            .map(|prompt| prompt.trim().to_owned())
            .map_err(|error| PromptRenderError {
                task_id: task.id().to_string(),
                reason: error.to_string(),
            })
    }
}

fn build_prompt_context(
    task: &Task,
    resource: &IsolationResource,
    parent_session_id: SessionId,
) -> Map<String, Value> {
    let mut context = Map::new();
    context.insert("task_id".to_owned(), Value::from(task.id().as_str()));
    context.insert("title".to_owned(), Value::from(task.title()));
    context.insert(
        "description".to_owned(),
        task.description().map_or(Value::Null, Value::from),
    );
    context.insert("priority".to_owned(), Value::from(task.priority()));
    context.insert("task_type".to_owned(), Value::from(task.task_type().as_str()));
    context.insert("branch".to_owned(), Value::from(resource.branch.as_str()));
    context.insert(
        "base_branch".to_owned(),
        Value::from(resource.base_branch.as_str()),
    );
    context.insert("workdir".to_owned(), Value::from(resource.path.as_str()));
    context.insert(
        "parent_session_id".to_owned(),
        Value::from(parent_session_id.to_string()),
    );
    context
}
