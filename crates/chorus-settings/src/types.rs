//! Settings types.
//!
//! Every struct is `#[serde(default)]` so a partial settings file only needs
//! the keys it overrides.

use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChorusSettings {
    /// Network and transport settings.
    pub server: ServerSettings,
    /// Session lifecycle settings.
    pub session: SessionSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

impl ChorusSettings {
    /// Reject values that would make the relay misbehave.
    pub fn validate(&self) -> crate::Result<()> {
        if self.server.send_queue_capacity == 0 {
            return Err(crate::SettingsError::InvalidValue(
                "server.sendQueueCapacity must be > 0".into(),
            ));
        }
        if self.session.reap_interval_secs == 0 {
            return Err(crate::SettingsError::InvalidValue(
                "session.reapIntervalSecs must be > 0".into(),
            ));
        }
        if self.session.idle_timeout_secs == 0 {
            return Err(crate::SettingsError::InvalidValue(
                "session.idleTimeoutSecs must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Network and transport settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// HTTP / WebSocket port.
    pub port: u16,
    /// Outbound frames buffered per channel before it counts as a failed send.
    pub send_queue_capacity: usize,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            send_queue_capacity: 1024,
            max_message_size: 16 * 1024 * 1024,
        }
    }
}

/// Session lifecycle settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Inactivity after which the reaper evicts a session.
    pub idle_timeout_secs: u64,
    /// How often the reaper scans.
    pub reap_interval_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 600,
            reap_interval_secs: 30,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level directive (`RUST_LOG` takes precedence).
    pub level: String,
    /// Emit JSON lines on stdout instead of human-readable text.
    pub json: bool,
    /// Optional log file, appended to in plain text. An empty string turns
    /// the file off.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl LoggingSettings {
    /// The log file to open, if any.
    pub fn file_path(&self) -> Option<&str> {
        self.file.as_deref().filter(|f| !f.is_empty())
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: Some("server.log".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_relay_parameters() {
        let s = ChorusSettings::default();
        assert_eq!(s.server.host, "0.0.0.0");
        assert_eq!(s.server.port, 8000);
        assert_eq!(s.server.send_queue_capacity, 1024);
        assert_eq!(s.session.idle_timeout_secs, 600);
        assert_eq!(s.session.reap_interval_secs, 30);
        assert_eq!(s.logging.level, "info");
        assert_eq!(s.logging.file.as_deref(), Some("server.log"));
        assert!(s.validate().is_ok());
    }

    #[test]
    fn camel_case_keys() {
        let value = serde_json::to_value(ChorusSettings::default()).unwrap();
        assert!(value["server"]["sendQueueCapacity"].is_number());
        assert!(value["session"]["idleTimeoutSecs"].is_number());
        assert!(value["session"]["reapIntervalSecs"].is_number());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: ChorusSettings =
            serde_json::from_str(r#"{"server":{"port":9000}}"#).unwrap();
        assert_eq!(s.server.port, 9000);
        assert_eq!(s.server.host, "0.0.0.0");
        assert_eq!(s.session.idle_timeout_secs, 600);
    }

    #[test]
    fn empty_log_file_disables_file_output() {
        let s: ChorusSettings = serde_json::from_str(r#"{"logging":{"file":""}}"#).unwrap();
        assert_eq!(s.logging.file_path(), None);
        assert_eq!(LoggingSettings::default().file_path(), Some("server.log"));
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let mut s = ChorusSettings::default();
        s.session.reap_interval_secs = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_queue() {
        let mut s = ChorusSettings::default();
        s.server.send_queue_capacity = 0;
        assert!(s.validate().is_err());
    }
}
