//! In-memory task store for tests and embedded use.

use async_trait::async_trait;
use mockable::Clock;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::task::{
    domain::{Task, TaskId},
    ports::{TaskQuery, TaskStore, TaskStoreError, TaskStoreResult},
};

/// Thread-safe in-memory task store.
///
/// Besides the read port it exposes the handful of mutations the scheduler's
/// collaborators perform (agents starting and closing tasks), so scenarios
/// can drive the task tree.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskStore {
    state: Arc<RwLock<HashMap<TaskId, Task>>>,
}

impl InMemoryTaskStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::DuplicateTask`] when the identifier is taken.
    pub fn insert(&self, task: Task) -> TaskStoreResult<()> {
        let mut tasks = self.state.write().map_err(poisoned)?;
        if tasks.contains_key(task.id()) {
            return Err(TaskStoreError::DuplicateTask(task.id().clone()));
        }
        tasks.insert(task.id().clone(), task);
        Ok(())
    }

    /// Marks a task as in progress.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::NotFound`] when the task does not exist.
    pub fn start(&self, id: &TaskId) -> TaskStoreResult<()> {
        self.modify(id, Task::start)
    }

    /// Closes a task with an optional reason and commit.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::NotFound`] when the task does not exist.
    pub fn close(
        &self,
        id: &TaskId,
        reason: Option<&str>,
        commit_sha: Option<&str>,
        clock: &impl Clock,
    ) -> TaskStoreResult<()> {
        self.modify(id, |task| {
            task.close(
                reason.map(str::to_owned),
                commit_sha.map(str::to_owned),
                clock,
            );
        })
    }

    /// Reopens a task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::NotFound`] when the task does not exist.
    pub fn reopen(&self, id: &TaskId) -> TaskStoreResult<()> {
        self.modify(id, Task::reopen)
    }

    fn modify(&self, id: &TaskId, change: impl FnOnce(&mut Task)) -> TaskStoreResult<()> {
        let mut tasks = self.state.write().map_err(poisoned)?;
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| TaskStoreError::NotFound(id.clone()))?;
        change(task);
        Ok(())
    }
}

fn poisoned<E: std::fmt::Display>(err: E) -> TaskStoreError {
    TaskStoreError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn find_by_id(&self, id: &TaskId) -> TaskStoreResult<Option<Task>> {
        let tasks = self.state.read().map_err(poisoned)?;
        Ok(tasks.get(id).cloned())
    }

    async fn list_tasks(&self, query: &TaskQuery) -> TaskStoreResult<Vec<Task>> {
        let tasks = self.state.read().map_err(poisoned)?;
        Ok(tasks
            .values()
            .filter(|task| query.matches(task))
            .cloned()
            .collect())
    }
}
