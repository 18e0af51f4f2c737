//! Per-session mutual exclusion.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::workflow::domain::SessionId;

/// Serialises operations on the same session.
///
/// Workflow state has no field-level atomicity, so two read-modify-write
/// cycles on one session must not interleave. Different sessions never
/// contend.
#[derive(Debug, Clone, Default)]
pub struct SessionGate {
    locks: Arc<Mutex<HashMap<SessionId, Arc<AsyncMutex<()>>>>>,
}

impl SessionGate {
    /// Creates a gate with no sessions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `session_id`.
    ///
    /// Access is held until the guard is dropped.
    pub async fn lock(&self, session_id: SessionId) -> OwnedMutexGuard<()> {
        let session_lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(session_id).or_default())
        };
        session_lock.lock_owned().await
    }
}
