//! Per-session conversation history.
//!
//! [`HistoryStore`] maps a session id to its ordered message log. Sessions
//! are created lazily on first append. Callers must serialize requests for
//! the same session: two concurrent appends to one session interleave in
//! arbitrary order.

use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use lru::LruCache;

use crate::error::Result;
use crate::models::Message;

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Messages of `session_id` in insertion order; empty for unknown sessions.
    async fn messages(&self, session_id: &str) -> Result<Vec<Message>>;

    /// Append one message to `session_id`, creating the session if needed.
    ///
    /// Precondition: no other request for the same session is in flight.
    async fn append_message(&self, session_id: &str, message: Message) -> Result<()>;

    /// Append `messages` in order as one unit: either all of them are
    /// stored or, on error, none are.
    async fn append_messages(&self, session_id: &str, messages: Vec<Message>) -> Result<()>;

    /// Number of sessions currently held.
    async fn session_count(&self) -> Result<usize>;
}

/// In-memory history bounded by session count.
///
/// When full, the least recently used session (by read or write) is
/// evicted whole. Messages within a kept session are never trimmed.
pub struct InMemoryHistory {
    sessions: Mutex<LruCache<String, Vec<Message>>>,
}

impl InMemoryHistory {
    /// Hold at most `max_sessions` sessions; `0` means unbounded.
    pub fn new(max_sessions: usize) -> Self {
        let sessions = match NonZeroUsize::new(max_sessions) {
            Some(cap) => LruCache::new(cap),
            None => LruCache::unbounded(),
        };
        Self {
            sessions: Mutex::new(sessions),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(0)
    }
}

impl Default for InMemoryHistory {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistory {
    async fn messages(&self, session_id: &str) -> Result<Vec<Message>> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(sessions.get(session_id).cloned().unwrap_or_default())
    }

    async fn append_message(&self, session_id: &str, message: Message) -> Result<()> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        match sessions.get_mut(session_id) {
            Some(log) => log.push(message),
            None => {
                sessions.put(session_id.to_string(), vec![message]);
            }
        }
        Ok(())
    }

    async fn append_messages(&self, session_id: &str, messages: Vec<Message>) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        match sessions.get_mut(session_id) {
            Some(log) => log.extend(messages),
            None => {
                sessions.put(session_id.to_string(), messages);
            }
        }
        Ok(())
    }

    async fn session_count(&self) -> Result<usize> {
        Ok(self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len())
    }
}
