//! Adapter implementations for workflow state persistence.

pub mod memory;
pub mod postgres;
