//! Unit tests for workflow state persistence.
