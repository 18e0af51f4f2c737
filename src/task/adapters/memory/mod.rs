//! In-memory task store.

mod task_store;

pub use task_store::InMemoryTaskStore;
