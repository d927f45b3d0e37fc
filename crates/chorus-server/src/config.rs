//! Server configuration.

use std::time::Duration;

use chorus_settings::ChorusSettings;
use serde::{Deserialize, Serialize};

/// Runtime configuration for [`ChorusServer`](crate::server::ChorusServer).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` picks a free port).
    pub port: u16,
    /// Outbound frames buffered per channel.
    pub send_queue_capacity: usize,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Inactivity after which a session is evicted.
    pub idle_timeout_secs: u64,
    /// Interval between reaper scans.
    pub reap_interval_secs: u64,
}

impl ServerConfig {
    /// Idle threshold.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Reaper interval.
    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }

    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            send_queue_capacity: 1024,
            max_message_size: 16 * 1024 * 1024,
            idle_timeout_secs: 600,
            reap_interval_secs: 30,
        }
    }
}

impl From<&ChorusSettings> for ServerConfig {
    fn from(settings: &ChorusSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            send_queue_capacity: settings.server.send_queue_capacity,
            max_message_size: settings.server.max_message_size,
            idle_timeout_secs: settings.session.idle_timeout_secs,
            reap_interval_secs: settings.session.reap_interval_secs,
        }
    }
}
