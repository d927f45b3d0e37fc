//! Idle-session reaper.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::registry::SessionRegistry;
use crate::metrics::REAPER_EVICTIONS_TOTAL;

/// Evict every session idle longer than `idle_timeout` and close its channel.
///
/// Returns the number of sessions evicted.
pub fn reap_idle(registry: &SessionRegistry, idle_timeout: Duration) -> usize {
    let evicted = registry.evict_idle(idle_timeout, Instant::now());
    for conn in &evicted {
        info!(
            session_id = %conn.session_id,
            conn = conn.serial,
            idle_timeout_secs = idle_timeout.as_secs(),
            "evicting idle session"
        );
        conn.close();
    }
    if !evicted.is_empty() {
        counter!(REAPER_EVICTIONS_TOTAL).increment(evicted.len() as u64);
    }
    evicted.len()
}

/// Spawn the periodic reaper.
///
/// Scans every `interval` until `cancel` fires. The first scan happens one
/// full interval after start.
pub fn spawn_reaper(
    registry: Arc<SessionRegistry>,
    interval: Duration,
    idle_timeout: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("reaper stopped");
                    return;
                }
                _ = ticker.tick() => {
                    let removed = reap_idle(&registry, idle_timeout);
                    if removed > 0 {
                        info!(removed, remaining = registry.len(), "idle session cleanup");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::connection::ClientConnection;
    use chorus_core::SessionId;
    use tokio::sync::mpsc;

    const IDLE: Duration = Duration::from_secs(600);
    const INTERVAL: Duration = Duration::from_secs(30);

    fn register(registry: &SessionRegistry, id: &str) -> Arc<ClientConnection> {
        let (tx, _rx) = mpsc::channel(4);
        let conn = Arc::new(ClientConnection::new(SessionId::from(id), tx));
        let _ = registry.register(Arc::clone(&conn));
        conn
    }

    #[tokio::test(start_paused = true)]
    async fn reap_idle_evicts_and_closes() {
        let registry = SessionRegistry::new();
        let idle = register(&registry, "idle");
        time::advance(Duration::from_secs(601)).await;
        let active = register(&registry, "active");

        assert_eq!(reap_idle(&registry, IDLE), 1);
        assert!(idle.is_closed());
        assert!(!active.is_closed());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn touched_session_survives() {
        let registry = SessionRegistry::new();
        let conn = register(&registry, "chatty");
        time::advance(Duration::from_secs(590)).await;
        assert!(registry.touch(&conn.session_id));
        time::advance(Duration::from_secs(20)).await;

        assert_eq!(reap_idle(&registry, IDLE), 0);
        assert!(registry.contains(&conn.session_id));
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_task_evicts_without_traffic() {
        let registry = Arc::new(SessionRegistry::new());
        let conn = register(&registry, "quiet");
        let cancel = CancellationToken::new();
        let handle = spawn_reaper(Arc::clone(&registry), INTERVAL, IDLE, cancel.clone());

        // 600s is not yet idle; the scan at 630s evicts.
        time::sleep(Duration::from_secs(605)).await;
        assert!(registry.contains(&conn.session_id));
        time::sleep(Duration::from_secs(30)).await;
        assert!(!registry.contains(&conn.session_id));
        assert!(conn.is_closed());

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_immediately() {
        let registry = Arc::new(SessionRegistry::new());
        let cancel = CancellationToken::new();
        let handle = spawn_reaper(Arc::clone(&registry), INTERVAL, IDLE, cancel.clone());
        cancel.cancel();
        time::timeout(Duration::from_millis(1), handle)
            .await
            .expect("reaper should stop without waiting for a tick")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn double_removal_is_safe() {
        let registry = SessionRegistry::new();
        let conn = register(&registry, "gone");
        time::advance(Duration::from_secs(700)).await;
        assert_eq!(reap_idle(&registry, IDLE), 1);
        assert!(!registry.unregister_connection(&conn.session_id, conn.serial));
        assert!(registry.unregister(&conn.session_id).is_none());
    }
}
