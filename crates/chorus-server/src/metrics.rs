//! Prometheus metrics recorder and metric name constants.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::error::ServerError;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render `/metrics`. Call once at startup,
/// before any metric is recorded.
pub fn install_recorder() -> Result<PrometheusHandle, ServerError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// WebSocket channels opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket channels closed total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Open WebSocket channels (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Channel lifetime in seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Channels evicted after a failed broadcast send (counter).
pub const WS_BROADCAST_DROPS_TOTAL: &str = "ws_broadcast_drops_total";
/// Channels force-closed by a newer channel under the same id (counter).
pub const WS_TAKEOVERS_TOTAL: &str = "ws_takeovers_total";
/// Inbound frames that failed to decode (counter, labels: kind).
pub const WS_DECODE_ERRORS_TOTAL: &str = "ws_decode_errors_total";
/// Messages appended to the dialogue (counter, labels: source).
pub const DIALOGUE_MESSAGES_TOTAL: &str = "dialogue_messages_total";
/// Dialogue clears (counter).
pub const DIALOGUE_CLEARS_TOTAL: &str = "dialogue_clears_total";
/// Sessions evicted by the idle reaper (counter).
pub const REAPER_EVICTIONS_TOTAL: &str = "reaper_evictions_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_recorder_renders() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            metrics::counter!(DIALOGUE_MESSAGES_TOTAL, "source" => "ws").increment(2);
        });
        let output = handle.render();
        assert!(output.contains("dialogue_messages_total"));
        assert!(output.contains("source=\"ws\""));
    }

    #[test]
    fn metric_constants_are_snake_case() {
        let names = [
            WS_CONNECTIONS_TOTAL,
            WS_DISCONNECTIONS_TOTAL,
            WS_CONNECTIONS_ACTIVE,
            WS_CONNECTION_DURATION_SECONDS,
            WS_BROADCAST_DROPS_TOTAL,
            WS_TAKEOVERS_TOTAL,
            WS_DECODE_ERRORS_TOTAL,
            DIALOGUE_MESSAGES_TOTAL,
            DIALOGUE_CLEARS_TOTAL,
            REAPER_EVICTIONS_TOTAL,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "{name} is not snake_case"
            );
        }
    }
}
