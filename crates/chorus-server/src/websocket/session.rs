//! WebSocket session lifecycle: one connected channel from upgrade through
//! disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use chorus_core::{FrameError, InboundFrame, ServerEvent, SessionId};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::ClientConnection;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DECODE_ERRORS_TOTAL, WS_DISCONNECTIONS_TOTAL,
};
use crate::relay::{MessageSource, Relay};

/// How long the writer may keep flushing after the read loop ends.
const WRITER_DRAIN: Duration = Duration::from_secs(1);

/// Why a session's read loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitReason {
    /// The client sent a close frame or the stream ended.
    ClientClosed,
    /// Reading from the socket failed.
    TransportError,
    /// The channel was closed by the relay (takeover, reaper, failed send,
    /// or the writer losing the socket).
    ForcedClose,
    /// The server is shutting down.
    Shutdown,
}

impl ExitReason {
    /// Short label for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClientClosed => "client_closed",
            Self::TransportError => "transport_error",
            Self::ForcedClose => "forced_close",
            Self::Shutdown => "shutdown",
        }
    }
}

/// What a decoded text frame led to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A message was appended and broadcast.
    Posted,
    /// A pong was queued for the sender.
    Ponged,
    /// The frame type is not handled.
    Ignored,
    /// The frame could not be decoded.
    Rejected(&'static str),
}

/// Decode one text payload from `connection` and act on it.
pub fn dispatch_frame(relay: &Relay, connection: &ClientConnection, text: &str) -> FrameOutcome {
    match InboundFrame::decode(text) {
        Ok(InboundFrame::Message(message)) => {
            let report = relay.post_message(
                message,
                Some(&connection.session_id),
                MessageSource::Channel,
            );
            debug!(
                recipients = report.recipients,
                evicted = report.evicted,
                "message appended"
            );
            FrameOutcome::Posted
        }
        Ok(InboundFrame::Ping) => {
            if !connection.send_event(&ServerEvent::Pong) {
                debug!("pong not enqueued");
            }
            FrameOutcome::Ponged
        }
        Ok(frame @ InboundFrame::Unknown(_)) => {
            debug!(frame_type = frame.frame_type(), "ignoring unknown frame type");
            FrameOutcome::Ignored
        }
        Err(e) => {
            log_decode_error(&e);
            FrameOutcome::Rejected(e.error_kind())
        }
    }
}

fn log_decode_error(error: &FrameError) {
    warn!(kind = error.error_kind(), error = %error, "failed to decode frame");
    counter!(WS_DECODE_ERRORS_TOTAL, "kind" => error.error_kind()).increment(1);
}

/// Run a WebSocket session for a connected client.
///
/// 1. Registers the channel (closing any channel it displaces) and sends the
///    current dialogue
/// 2. Forwards queued frames to the socket from a dedicated writer task
/// 3. Decodes inbound frames and dispatches them
/// 4. Removes its own registration on exit, whatever the cause
#[instrument(skip_all, fields(session_id = %session_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    session_id: SessionId,
    relay: Arc<Relay>,
    send_queue_capacity: usize,
    shutdown: CancellationToken,
) -> ExitReason {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(send_queue_capacity.max(1));
    let connection = Arc::new(ClientConnection::new(session_id, send_tx));
    let close = connection.close_token();

    info!(conn = connection.serial, "client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let _ = relay.open_session(&connection);

    // Outbound forwarder: sole owner of the socket sink.
    let writer_close = close.clone();
    let mut outbound = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                frame = send_rx.recv() => {
                    let Some(text) = frame else { break };
                    if ws_tx.send(WsMessage::Text(String::clone(&text).into())).await.is_err() {
                        break;
                    }
                }
                () = writer_close.cancelled() => {
                    let _ = ws_tx.send(WsMessage::Close(None)).await;
                    break;
                }
            }
        }
        // Unblock the read loop if the socket went away first.
        writer_close.cancel();
    });

    let reason = loop {
        let next = tokio::select! {
            () = close.cancelled() => break ExitReason::ForcedClose,
            () = shutdown.cancelled() => break ExitReason::Shutdown,
            next = ws_rx.next() => next,
        };

        let msg = match next {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                debug!(error = %e, "websocket read failed");
                break ExitReason::TransportError;
            }
            None => break ExitReason::ClientClosed,
        };

        let text = match msg {
            WsMessage::Text(t) => Some(t.to_string()),
            WsMessage::Binary(data) => match String::from_utf8(data.to_vec()) {
                Ok(s) => Some(s),
                Err(_) => {
                    info!(len = data.len(), "received non-UTF8 binary frame");
                    None
                }
            },
            WsMessage::Ping(_) | WsMessage::Pong(_) => None,
            WsMessage::Close(_) => {
                debug!("client sent close frame");
                break ExitReason::ClientClosed;
            }
        };
        let _ = relay.touch(&connection);

        if let Some(text) = text {
            let _ = dispatch_frame(&relay, &connection, &text);
        }
    };

    let still_owned = relay.close_session(&connection);
    connection.close();
    if tokio::time::timeout(WRITER_DRAIN, &mut outbound).await.is_err() {
        outbound.abort();
    }

    info!(
        conn = connection.serial,
        reason = reason.as_str(),
        still_owned,
        dropped = connection.drop_count(),
        "client disconnected"
    );
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection.age().as_secs_f64());
    reason
}
