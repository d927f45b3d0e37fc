//! The relay context: dialogue store plus session registry.
//!
//! Every compound operation that mutates the dialogue (and then fans out) runs
//! while holding the dialogue mutex, so broadcasts are totally ordered and
//! every channel sees them in the same order. Lock order is always
//! dialogue → registry; nothing here awaits.

use std::sync::Arc;

use chorus_core::{Message, ServerEvent, SessionId};
use metrics::counter;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::dialogue::Dialogue;
use crate::metrics::{DIALOGUE_CLEARS_TOTAL, DIALOGUE_MESSAGES_TOTAL, WS_TAKEOVERS_TOTAL};
use crate::websocket::broadcast::{BroadcastReport, broadcast};
use crate::websocket::connection::ClientConnection;
use crate::websocket::registry::SessionRegistry;

/// Where an appended message came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageSource {
    /// A `message` frame on a channel.
    Channel,
    /// The administrative HTTP API.
    Admin,
}

impl MessageSource {
    fn as_str(self) -> &'static str {
        match self {
            Self::Channel => "ws",
            Self::Admin => "http",
        }
    }
}

/// Shared relay state.
pub struct Relay {
    dialogue: Mutex<Dialogue>,
    registry: Arc<SessionRegistry>,
}

impl Relay {
    /// Create an empty relay.
    pub fn new() -> Self {
        Self {
            dialogue: Mutex::new(Dialogue::new()),
            registry: Arc::new(SessionRegistry::new()),
        }
    }

    /// The session registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Register a new channel and send it the current dialogue.
    ///
    /// Any channel previously holding the same id is closed and returned.
    pub fn open_session(&self, connection: &Arc<ClientConnection>) -> Option<Arc<ClientConnection>> {
        let displaced = {
            let mut dialogue = self.dialogue.lock();
            let displaced = self.registry.register(Arc::clone(connection));
            dialogue.open_session(&connection.session_id);
            let snapshot = ServerEvent::update_dialogue(dialogue.snapshot());
            if !connection.send_event(&snapshot) {
                debug!(session_id = %connection.session_id, "initial snapshot not enqueued");
            }
            displaced
        };

        if let Some(old) = &displaced {
            info!(
                session_id = %connection.session_id,
                old_conn = old.serial,
                new_conn = connection.serial,
                "session taken over by new channel"
            );
            counter!(WS_TAKEOVERS_TOTAL).increment(1);
            old.close();
        }
        displaced
    }

    /// Remove this channel's own registration. Returns `false` if it was
    /// already gone or replaced.
    ///
    /// Once no channel holds the id, an empty per-session history is dropped.
    pub fn close_session(&self, connection: &ClientConnection) -> bool {
        let mut dialogue = self.dialogue.lock();
        let owned = self
            .registry
            .unregister_connection(&connection.session_id, connection.serial);
        if !self.registry.contains(&connection.session_id) {
            let _ = dialogue.prune_session(&connection.session_id);
        }
        owned
    }

    /// Record activity on a channel.
    pub fn touch(&self, connection: &ClientConnection) -> bool {
        self.registry
            .touch_connection(&connection.session_id, connection.serial)
    }

    /// Append a message and broadcast the full dialogue to every channel.
    pub fn post_message(
        &self,
        message: Message,
        origin: Option<&SessionId>,
        source: MessageSource,
    ) -> BroadcastReport {
        let mut dialogue = self.dialogue.lock();
        dialogue.append(message, origin);
        counter!(DIALOGUE_MESSAGES_TOTAL, "source" => source.as_str()).increment(1);
        let event = ServerEvent::update_dialogue(dialogue.snapshot());
        broadcast(&self.registry, &event)
    }

    /// Clear the dialogue and broadcast the empty view.
    ///
    /// Per-session histories are dropped; connected sessions start a fresh one.
    pub fn clear(&self) -> BroadcastReport {
        let mut dialogue = self.dialogue.lock();
        dialogue.clear();
        for connection in self.registry.snapshot() {
            dialogue.open_session(&connection.session_id);
        }
        counter!(DIALOGUE_CLEARS_TOTAL).increment(1);
        broadcast(&self.registry, &ServerEvent::update_dialogue(Vec::new()))
    }

    /// Copy of the global dialogue.
    pub fn dialogue(&self) -> Vec<Message> {
        self.dialogue.lock().snapshot()
    }

    /// Copy of one session's messages.
    pub fn session_dialogue(&self, id: &SessionId) -> Option<Vec<Message>> {
        self.dialogue.lock().session_snapshot(id)
    }

    /// Number of messages in the global dialogue.
    pub fn dialogue_len(&self) -> usize {
        self.dialogue.lock().len()
    }

    /// Number of sessions holding a per-session history.
    pub fn session_history_count(&self) -> usize {
        self.dialogue.lock().session_count()
    }

    /// Number of registered channels.
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new()
    }
}
