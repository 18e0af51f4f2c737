//! Schema versioning for persisted orchestration state.
//!
//! State is stored inside a workflow variable as a versioned snapshot. Older
//! layouts are upgraded to the current schema on read, and the next save
//! writes the current layout only.

pub mod snapshot;
pub mod upgrader;

pub use snapshot::{LEGACY_VARIABLES, STATE_VARIABLE, VersionedSnapshot};
pub use upgrader::StateUpgrader;
