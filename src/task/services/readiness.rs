//! Readiness computation over the task dependency graph.
//!
//! [`TaskReadinessResolver`] answers which tasks under a parent can be handed
//! to an agent right now. It performs reads only.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::task::{
    domain::{Task, TaskId, TaskStatus},
    ports::{TaskQuery, TaskStore, TaskStoreResult},
};

/// Upper bound on parent links followed when walking towards the root.
///
/// Guards against cycles in malformed parent data.
pub const MAX_ANCESTRY_DEPTH: usize = 128;

/// Per-status task counts for a subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubtreeSummary {
    counts: BTreeMap<&'static str, usize>,
    total: usize,
}

impl SubtreeSummary {
    /// Returns the number of subtree tasks with the given status.
    #[must_use]
    pub fn count(&self, status: TaskStatus) -> usize {
        self.counts.get(status.as_str()).copied().unwrap_or(0)
    }

    /// Returns the number of tasks in the subtree.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }

    fn record(&mut self, status: TaskStatus) {
        *self.counts.entry(status.as_str()).or_insert(0) += 1;
        self.total += 1;
    }
}

/// Computes ready tasks within a subtree of the task tree.
#[derive(Clone)]
pub struct TaskReadinessResolver<T>
where
    T: TaskStore,
{
    store: Arc<T>,
}

impl<T> TaskReadinessResolver<T>
where
    T: TaskStore,
{
    /// Creates a resolver reading from the given store.
    #[must_use]
    pub const fn new(store: Arc<T>) -> Self {
        Self { store }
    }

    /// Lists ready tasks in the subtree rooted at `parent_task_id`.
    ///
    /// A task is ready when it is open, not a container type, and every
    /// blocking dependency is closed. The parent itself belongs to its own
    /// subtree. Results are ordered by ascending priority, then creation
    /// time, then identifier.
    ///
    /// # Errors
    ///
    /// Propagates task store read failures.
    pub async fn list_ready_descendants(
        &self,
        parent_task_id: &TaskId,
    ) -> TaskStoreResult<Vec<Task>> {
        let candidates = self
            .store
            .list_tasks(&TaskQuery::new().with_status(TaskStatus::Open))
            .await?;

        let mut ancestry = AncestryIndex::default();
        let mut ready = Vec::new();
        for task in candidates {
            if task.task_type().is_container() {
                continue;
            }
            if !ancestry
                .is_descendant(self.store.as_ref(), task.id(), parent_task_id)
                .await?
            {
                continue;
            }
            if !self.dependencies_closed(&task).await? {
                debug!(task_id = %task.id(), "task has open blockers");
                continue;
            }
            ready.push(task);
        }

        ready.sort_by(readiness_order);
        Ok(ready)
    }

    /// Returns `true` when `task_id` lies in the subtree rooted at
    /// `ancestor_id`.
    ///
    /// A task is its own descendant. The upward walk stops after
    /// [`MAX_ANCESTRY_DEPTH`] links or on revisiting a task.
    ///
    /// # Errors
    ///
    /// Propagates task store read failures.
    pub async fn is_descendant_of(
        &self,
        task_id: &TaskId,
        ancestor_id: &TaskId,
    ) -> TaskStoreResult<bool> {
        AncestryIndex::default()
            .is_descendant(self.store.as_ref(), task_id, ancestor_id)
            .await
    }

    /// Counts the tasks of the subtree rooted at `parent_task_id` by status.
    ///
    /// # Errors
    ///
    /// Propagates task store read failures.
    pub async fn subtree_summary(&self, parent_task_id: &TaskId) -> TaskStoreResult<SubtreeSummary> {
        let tasks = self.store.list_tasks(&TaskQuery::new()).await?;
        let mut ancestry = AncestryIndex::default();
        let mut summary = SubtreeSummary::default();
        for task in &tasks {
            ancestry.remember(task);
        }
        for task in &tasks {
            if ancestry
                .is_descendant(self.store.as_ref(), task.id(), parent_task_id)
                .await?
            {
                summary.record(task.status());
            }
        }
        Ok(summary)
    }

    async fn dependencies_closed(&self, task: &Task) -> TaskStoreResult<bool> {
        for blocker_id in task.blockers() {
            match self.store.find_by_id(blocker_id).await? {
                Some(blocker) if !blocker.status().is_closed() => return Ok(false),
                Some(_) => {}
                None => {
                    debug!(
                        task_id = %task.id(),
                        blocker_id = %blocker_id,
                        "ignoring dependency on missing task"
                    );
                }
            }
        }
        Ok(true)
    }
}

fn readiness_order(left: &Task, right: &Task) -> Ordering {
    left.priority()
        .cmp(&right.priority())
        .then_with(|| left.created_at().cmp(&right.created_at()))
        .then_with(|| left.id().cmp(right.id()))
}

/// Memoised parent links gathered during a single resolver call.
#[derive(Debug, Default)]
struct AncestryIndex {
    parents: HashMap<TaskId, Option<TaskId>>,
}

impl AncestryIndex {
    fn remember(&mut self, task: &Task) {
        self.parents
            .insert(task.id().clone(), task.parent_task_id().cloned());
    }

    async fn parent_of<T: TaskStore + ?Sized>(
        &mut self,
        store: &T,
        task_id: &TaskId,
    ) -> TaskStoreResult<Option<TaskId>> {
        if let Some(parent) = self.parents.get(task_id) {
            return Ok(parent.clone());
        }
        let parent = store
            .find_by_id(task_id)
            .await?
            .and_then(|task| task.parent_task_id().cloned());
        self.parents.insert(task_id.clone(), parent.clone());
        Ok(parent)
    }

    async fn is_descendant<T: TaskStore + ?Sized>(
        &mut self,
        store: &T,
        task_id: &TaskId,
        ancestor_id: &TaskId,
    ) -> TaskStoreResult<bool> {
        let mut current = task_id.clone();
        let mut visited = HashSet::new();
        for _ in 0..=MAX_ANCESTRY_DEPTH {
            if current == *ancestor_id {
                return Ok(true);
            }
            if !visited.insert(current.clone()) {
                debug!(task_id = %task_id, "parent cycle detected");
                return Ok(false);
            }
            match self.parent_of(store, &current).await? {
                Some(parent) => current = parent,
                None => return Ok(false),
            }
        }
        Ok(false)
    }
}
