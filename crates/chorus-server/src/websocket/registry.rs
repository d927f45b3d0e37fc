//! Session registry: session id → live channel plus last-activity time.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chorus_core::SessionId;
use parking_lot::RwLock;
use tokio::time::Instant;

use super::connection::ClientConnection;

struct Entry {
    connection: Arc<ClientConnection>,
    last_active: Instant,
}

/// Registry of active sessions.
///
/// The channel handle and its last-active timestamp live in one entry, so
/// one never exists without the other. Every method is a single critical
/// section and none of them blocks on I/O.
#[derive(Default)]
pub struct SessionRegistry {
    entries: RwLock<HashMap<SessionId, Entry>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `connection` under its session id with last-active = now.
    ///
    /// Returns the channel previously registered under that id, if it was a
    /// different one. The caller is responsible for closing it.
    pub fn register(&self, connection: Arc<ClientConnection>) -> Option<Arc<ClientConnection>> {
        let id = connection.session_id.clone();
        let serial = connection.serial;
        let previous = self.entries.write().insert(
            id,
            Entry {
                connection,
                last_active: Instant::now(),
            },
        );
        previous
            .map(|e| e.connection)
            .filter(|prev| prev.serial != serial)
    }

    /// Set last-active to now. Returns `false` if `id` is not registered.
    pub fn touch(&self, id: &SessionId) -> bool {
        match self.entries.write().get_mut(id) {
            Some(entry) => {
                entry.last_active = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Like [`touch`](Self::touch), but only if `id` is still held by the
    /// channel with `serial`.
    pub fn touch_connection(&self, id: &SessionId, serial: u64) -> bool {
        match self.entries.write().get_mut(id) {
            Some(entry) if entry.connection.serial == serial => {
                entry.last_active = Instant::now();
                true
            }
            _ => false,
        }
    }

    /// Remove `id` and its timestamp. Idempotent.
    pub fn unregister(&self, id: &SessionId) -> Option<Arc<ClientConnection>> {
        self.entries.write().remove(id).map(|e| e.connection)
    }

    /// Remove `id` only if it is still held by the channel with `serial`.
    ///
    /// A handler calls this on exit so that, after a takeover, it never
    /// evicts the channel that replaced it.
    pub fn unregister_connection(&self, id: &SessionId, serial: u64) -> bool {
        let mut entries = self.entries.write();
        let owned = entries
            .get(id)
            .is_some_and(|e| e.connection.serial == serial);
        if owned {
            let _ = entries.remove(id);
        }
        owned
    }

    /// Copy of the currently registered channels.
    pub fn snapshot(&self) -> Vec<Arc<ClientConnection>> {
        self.entries
            .read()
            .values()
            .map(|e| Arc::clone(&e.connection))
            .collect()
    }

    /// Remove every entry idle for longer than `threshold` as of `now`.
    pub fn evict_idle(&self, threshold: Duration, now: Instant) -> Vec<Arc<ClientConnection>> {
        let mut entries = self.entries.write();
        let stale: Vec<SessionId> = entries
            .iter()
            .filter(|(_, e)| now.saturating_duration_since(e.last_active) > threshold)
            .map(|(id, _)| id.clone())
            .collect();
        stale
            .iter()
            .filter_map(|id| entries.remove(id))
            .map(|e| e.connection)
            .collect()
    }

    /// Last-active time of `id`.
    pub fn last_active(&self, id: &SessionId) -> Option<Instant> {
        self.entries.read().get(id).map(|e| e.last_active)
    }

    /// Channel currently registered under `id`.
    pub fn get(&self, id: &SessionId) -> Option<Arc<ClientConnection>> {
        self.entries.read().get(id).map(|e| Arc::clone(&e.connection))
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &SessionId) -> bool {
        self.entries.read().contains_key(id)
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no session is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
