//! Orchestrator configuration.
//!
//! Configuration is plain data with serde support so that embedding daemons
//! can load it from their own settings files. Every field has a default.

use crate::orchestration::ports::AgentMode;
use minijinja::Environment;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Default number of agents one session may have working at once.
pub const DEFAULT_MAX_CONCURRENT: u32 = 3;

/// Default agent prompt.
pub const DEFAULT_PROMPT_TEMPLATE: &str = "\
You are working on task {{ task_id }}: {{ title }}.
{% if description %}
{{ description }}
{% endif %}
Your working copy is {{ workdir }} on branch {{ branch }}.
Commit your work and close the task when it is done.";

/// Settings for the parallel orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    /// Cap used when a call does not pass `max_concurrent`.
    pub default_max_concurrent: u32,
    /// Workflow name given to newly created workflow state.
    pub workflow_name: String,
    /// Step given to newly created workflow state.
    pub orchestration_step: String,
    /// Prefix of branches created for tasks.
    pub branch_prefix: String,
    /// Branch new isolation resources fork from.
    pub base_branch: String,
    /// Agent provider forwarded to the execution backend.
    pub agent_provider: String,
    /// Hosting mode forwarded to the execution backend.
    pub agent_mode: AgentMode,
    /// `minijinja` template for agent prompts.
    pub prompt_template: String,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            default_max_concurrent: DEFAULT_MAX_CONCURRENT,
            workflow_name: "parallel-orchestrator".to_owned(),
            orchestration_step: "orchestrate".to_owned(),
            branch_prefix: "task/".to_owned(),
            base_branch: "main".to_owned(),
            agent_provider: "claude".to_owned(),
            agent_mode: AgentMode::Terminal,
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_owned(),
        }
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// The document could not be parsed.
    #[error("failed to parse orchestration config: {0}")]
    Parse(Arc<serde_json::Error>),

    /// `default_max_concurrent` is zero.
    #[error("default_max_concurrent must be greater than zero")]
    ZeroConcurrency,

    /// A required text field is blank.
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    /// The prompt template does not compile.
    #[error("invalid prompt template: {0}")]
    InvalidTemplate(String),
}

impl OrchestrationConfig {
    /// Parses and validates a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and the errors of
    /// [`Self::validate`] for invalid values.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|err| ConfigError::Parse(Arc::new(err)))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_max_concurrent == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        let required = [
            ("workflow_name", &self.workflow_name),
            ("orchestration_step", &self.orchestration_step),
            ("base_branch", &self.base_branch),
            ("agent_provider", &self.agent_provider),
        ];
        if let Some(&(name, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ConfigError::EmptyField(name));
        }
        let environment = Environment::new();
        environment
            .template_from_str(&self.prompt_template)
            .map(drop)
            .map_err(|err| ConfigError::InvalidTemplate(err.to_string()))
    }

    /// Sets the default concurrency cap.
    #[must_use]
    pub const fn with_default_max_concurrent(mut self, value: u32) -> Self {
        self.default_max_concurrent = value;
        self
    }

    /// Sets the branch prefix.
    #[must_use]
    pub fn with_branch_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.branch_prefix = prefix.into();
        self
    }

    /// Sets the base branch.
    #[must_use]
    pub fn with_base_branch(mut self, branch: impl Into<String>) -> Self {
        self.base_branch = branch.into();
        self
    }

    /// Sets the agent provider and mode.
    #[must_use]
    pub fn with_agent(mut self, provider: impl Into<String>, mode: AgentMode) -> Self {
        self.agent_provider = provider.into();
        self.agent_mode = mode;
        self
    }

    /// Sets the prompt template.
    #[must_use]
    pub fn with_prompt_template(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = template.into();
        self
    }
}
