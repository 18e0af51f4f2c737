//! In-memory workflow state repository.

mod repository;

pub use repository::InMemoryWorkflowStateRepository;
