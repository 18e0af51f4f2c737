//! Chantier: parallel agent orchestration over a dependency-ordered task
//! tree.
//!
//! A parent agent session asks the orchestrator to spawn worker agents for
//! every ready task under a parent task, each in its own isolated working
//! copy, up to a concurrency cap. Repeated polls reconcile spawned agents
//! into completed or failed, so the tree drains without exceeding the cap
//! and without losing track of agents across daemon restarts.
//!
//! # Architecture
//!
//! Chantier follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (database, in-memory)
//!
//! # Modules
//!
//! - [`task`]: Task tree read model and readiness resolution
//! - [`workflow`]: Per-session workflow state persistence
//! - [`orchestration`]: Assignment tracking, liveness and scheduling

pub mod orchestration;
pub mod task;
pub mod workflow;
