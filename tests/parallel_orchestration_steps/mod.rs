//! Step definitions for parallel orchestration scenarios.

pub mod given;
pub mod then;
pub mod when;
pub mod world;
