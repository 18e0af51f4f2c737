//! Application services over the task tree.

mod readiness;

pub use readiness::{MAX_ANCESTRY_DEPTH, SubtreeSummary, TaskReadinessResolver};
