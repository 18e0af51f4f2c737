//! Versioned snapshot envelope.

use crate::orchestration::domain::OrchestrationState;
use crate::orchestration::ports::{StateStoreError, StateStoreResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Workflow variable holding the versioned snapshot.
pub const STATE_VARIABLE: &str = "orchestration_state";

/// Workflow variables used by the schema 1 layout.
pub const LEGACY_VARIABLES: [&str; 3] = ["spawned_agents", "completed_agents", "failed_agents"];

/// Orchestration state tagged with its schema version.
///
/// **Schema 2 format:**
/// ```json
/// { "schema_version": 2, "state": { "assignments": [...] } }
/// ```
///
/// Schema 1 had no envelope; the three legacy variables sat directly in the
/// workflow variables and [`VersionedSnapshot::from_legacy_variables`] wraps
/// them for upgrading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedSnapshot {
    schema_version: u32,
    state: Value,
}

impl VersionedSnapshot {
    /// Creates a snapshot from raw parts.
    #[must_use]
    pub const fn new(schema_version: u32, state: Value) -> Self {
        Self {
            schema_version,
            state,
        }
    }

    /// Encodes `state` at `schema_version`.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError::Encode`] when serialisation fails.
    pub fn encode(schema_version: u32, state: &OrchestrationState) -> StateStoreResult<Self> {
        let value = serde_json::to_value(state).map_err(StateStoreError::encode)?;
        Ok(Self::new(schema_version, value))
    }

    /// Reads a snapshot stored in a workflow variable.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError::Decode`] when the value is not an envelope.
    pub fn from_variable(value: &Value) -> StateStoreResult<Self> {
        Self::deserialize(value).map_err(StateStoreError::decode)
    }

    /// Wraps schema 1 variables, if any are present.
    #[must_use]
    pub fn from_legacy_variables(variables: &Map<String, Value>) -> Option<Self> {
        let legacy: Map<String, Value> = LEGACY_VARIABLES
            .iter()
            .filter_map(|key| {
                variables
                    .get(*key)
                    .map(|value| ((*key).to_owned(), value.clone()))
            })
            .collect();
        if legacy.is_empty() {
            return None;
        }
        Some(Self::new(1, Value::Object(legacy)))
    }

    /// Returns the schema version.
    #[must_use]
    pub const fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// Returns the raw state payload.
    #[must_use]
    pub const fn state(&self) -> &Value {
        &self.state
    }

    /// Converts the snapshot into a workflow variable value.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError::Encode`] when serialisation fails.
    pub fn to_variable(&self) -> StateStoreResult<Value> {
        serde_json::to_value(self).map_err(StateStoreError::encode)
    }

    /// Decodes the payload as current-schema state.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError::Decode`] when the payload does not match
    /// the current schema or violates state invariants.
    pub fn into_state(self) -> StateStoreResult<OrchestrationState> {
        serde_json::from_value(self.state).map_err(StateStoreError::decode)
    }
}
