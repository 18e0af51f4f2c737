//! Unit tests for the orchestration module.
