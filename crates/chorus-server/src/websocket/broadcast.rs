//! Event fan-out to every registered channel.

use std::sync::Arc;

use chorus_core::ServerEvent;
use metrics::counter;
use tracing::{debug, warn};

use super::registry::SessionRegistry;
use crate::metrics::WS_BROADCAST_DROPS_TOTAL;

/// Outcome of one broadcast pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Channels in the registry snapshot.
    pub recipients: usize,
    /// Channels the frame was enqueued on.
    pub delivered: usize,
    /// Channels evicted because the enqueue failed.
    pub evicted: usize,
}

/// Send `event` to every channel registered at call time.
///
/// The event is serialized once. A channel whose queue is closed or full is
/// collected during the pass; after the pass each one is unregistered (only
/// if it still owns its id) and closed.
pub fn broadcast(registry: &SessionRegistry, event: &ServerEvent) -> BroadcastReport {
    let json = match event.to_json() {
        Ok(j) => Arc::new(j),
        Err(e) => {
            warn!(event_type = event.event_type(), error = %e, "failed to serialize event");
            return BroadcastReport::default();
        }
    };

    let connections = registry.snapshot();
    let mut report = BroadcastReport {
        recipients: connections.len(),
        ..BroadcastReport::default()
    };

    let mut failed = Vec::new();
    for conn in &connections {
        if conn.send(Arc::clone(&json)) {
            report.delivered += 1;
        } else {
            failed.push(Arc::clone(conn));
        }
    }

    for conn in failed {
        warn!(
            session_id = %conn.session_id,
            conn = conn.serial,
            event_type = event.event_type(),
            "failed to send event to client, evicting"
        );
        if registry.unregister_connection(&conn.session_id, conn.serial) {
            report.evicted += 1;
            counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
        }
        conn.close();
    }

    debug!(
        event_type = event.event_type(),
        recipients = report.recipients,
        delivered = report.delivered,
        evicted = report.evicted,
        "broadcast event to all"
    );
    report
}
