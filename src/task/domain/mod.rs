//! Domain model for the task tree read by the orchestrator.
//!
//! Tasks are owned by an external task store. The domain here captures only
//! what scheduling needs: status, type, priority, parent links and blocking
//! dependencies.

mod error;
mod ids;
mod status;
mod task;

pub use error::{ParseTaskStatusError, ParseTaskTypeError, TaskDomainError};
pub use ids::TaskId;
pub use status::{TaskStatus, TaskType};
pub use task::{DEFAULT_PRIORITY, PersistedTaskData, Task};
