//! Per-channel connection handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chorus_core::{ServerEvent, SessionId};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// A live WebSocket channel bound to one session id.
///
/// The handle only enqueues: a single writer task owns the socket sink and
/// drains `tx`, so frames reach the client in enqueue order.
pub struct ClientConnection {
    /// Process-unique serial distinguishing successive channels of one id.
    pub serial: u64,
    /// Session this channel belongs to.
    pub session_id: SessionId,
    tx: mpsc::Sender<Arc<String>>,
    close: CancellationToken,
    /// When the channel was opened.
    pub connected_at: Instant,
    dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Create a connection handle around an outbound queue.
    pub fn new(session_id: SessionId, tx: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            serial: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
            session_id,
            tx,
            close: CancellationToken::new(),
            connected_at: Instant::now(),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Enqueue a pre-serialized frame.
    ///
    /// Returns `false` if the queue is full or the writer is gone.
    pub fn send(&self, frame: Arc<String>) -> bool {
        if self.close.is_cancelled() {
            return false;
        }
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Serialize and enqueue a single event for this channel only.
    pub fn send_event(&self, event: &ServerEvent) -> bool {
        match event.to_json() {
            Ok(json) => self.send(Arc::new(json)),
            Err(e) => {
                warn!(event_type = event.event_type(), error = %e, "failed to serialize event");
                false
            }
        }
    }

    /// Request the channel be closed. Idempotent.
    pub fn close(&self) {
        self.close.cancel();
    }

    /// Whether a close has been requested.
    pub fn is_closed(&self) -> bool {
        self.close.is_cancelled()
    }

    /// Token cancelled when the channel is force-closed.
    pub fn close_token(&self) -> CancellationToken {
        self.close.clone()
    }

    /// Frames that could not be enqueued.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Time since the channel was opened.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("serial", &self.serial)
            .field("session_id", &self.session_id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
