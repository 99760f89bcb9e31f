//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

use hintforge_session::SessionConfig;
use hintforge_store::LeftoverPolicy;
use serde::{Deserialize, Serialize};

/// Everything the supervisor needs besides the connector.
///
/// Every field has a default, so a config file only needs the values it
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub session: SessionConfig,

    /// Seconds between keepalive checks. Default: 15.
    pub keepalive_interval_secs: u64,

    /// Seconds a connect may stay in `Connecting`. Default: 15.
    pub connect_timeout_secs: u64,

    /// Seconds a ping may take to be written. Default: 10.
    pub ping_timeout_secs: u64,

    /// Root for cached datapack files. `None` keeps datapacks in memory.
    pub data_dir: Option<PathBuf>,

    /// Key/value file for credentials and pending hints. `None` keeps them
    /// in memory.
    pub state_file: Option<PathBuf>,

    /// What a pending-hint dispatch does with entries for other slots.
    pub pending_leftovers: LeftoverPolicy,

    /// Default log filter when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            keepalive_interval_secs: 15,
            connect_timeout_secs: 15,
            ping_timeout_secs: 10,
            data_dir: None,
            state_file: None,
            pending_leftovers: LeftoverPolicy::default(),
            log_filter: "info".into(),
        }
    }
}

impl ClientConfig {
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timings() {
        let config = ClientConfig::default();
        assert_eq!(config.keepalive_interval(), Duration::from_secs(15));
        assert_eq!(config.connect_timeout(), Duration::from_secs(15));
        assert_eq!(config.ping_timeout(), Duration::from_secs(10));
        assert_eq!(config.pending_leftovers, LeftoverPolicy::Discard);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: ClientConfig = serde_json::from_value(serde_json::json!({
            "keepalive_interval_secs": 30,
            "pending_leftovers": "retain",
            "session": {"refresh_delay_secs": 1}
        }))
        .unwrap();

        assert_eq!(config.keepalive_interval_secs, 30);
        assert_eq!(config.connect_timeout_secs, 15);
        assert_eq!(config.pending_leftovers, LeftoverPolicy::Retain);
        assert_eq!(config.session.refresh_delay_secs, 1);
        assert_eq!(config.session.settings_key, "APSudoku_Settings");
    }
}
