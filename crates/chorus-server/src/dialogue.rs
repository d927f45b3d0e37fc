//! In-memory dialogue store.

use std::collections::HashMap;

use chorus_core::{Message, SessionId};

/// The shared conversation log.
///
/// Holds one global sequence plus a per-session copy of every message a
/// session contributed. Callers serialize access; the relay keeps it behind
/// a mutex.
#[derive(Debug, Default)]
pub struct Dialogue {
    global: Vec<Message>,
    sessions: HashMap<SessionId, Vec<Message>>,
}

impl Dialogue {
    /// Create an empty dialogue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the global sequence, and to `origin`'s sequence if it has one.
    pub fn append(&mut self, message: Message, origin: Option<&SessionId>) {
        if let Some(history) = origin.and_then(|id| self.sessions.get_mut(id)) {
            history.push(message.clone());
        }
        self.global.push(message);
    }

    /// Ensure a per-session sequence exists for `id`.
    pub fn open_session(&mut self, id: &SessionId) {
        let _ = self.sessions.entry(id.clone()).or_default();
    }

    /// Copy of the global sequence, oldest first.
    pub fn snapshot(&self) -> Vec<Message> {
        self.global.clone()
    }

    /// Drop `id`'s sequence if it holds no messages.
    ///
    /// Returns `true` if an entry was removed.
    pub fn prune_session(&mut self, id: &SessionId) -> bool {
        if self.sessions.get(id).is_some_and(Vec::is_empty) {
            self.sessions.remove(id).is_some()
        } else {
            false
        }
    }

    /// Copy of `id`'s sequence, or `None` if the session is unknown.
    pub fn session_snapshot(&self, id: &SessionId) -> Option<Vec<Message>> {
        self.sessions.get(id).cloned()
    }

    /// Empty the global sequence and drop every per-session sequence.
    pub fn clear(&mut self) {
        self.global.clear();
        self.sessions.clear();
    }

    /// Number of messages in the global sequence.
    pub fn len(&self) -> usize {
        self.global.len()
    }

    /// Whether the global sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.global.is_empty()
    }

    /// Number of sessions with a per-session sequence.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
