//! Per-session mutual exclusion.
//!
//! The pipeline expects at most one in-flight question per session.
//! [`SessionLocks`] hands out one async mutex per session id; requests for
//! different sessions never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `session_id`. Access ends when the
    /// guard is dropped.
    pub async fn lock(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Entries only the map references are idle.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(session_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Sessions with a request in flight or waiting.
    pub fn active(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|lock| Arc::strong_count(lock) > 1)
            .count()
    }
}
