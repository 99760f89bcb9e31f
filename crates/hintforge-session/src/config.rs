//! Session configuration.

use std::time::Duration;

use hintforge_protocol::NetworkVersion;
use serde::{Deserialize, Serialize};

/// What the session announces to the server and how long it waits
/// between the steps that follow a successful connect.
///
/// The grace windows assume the server answers within them; replies that
/// arrive later still update state, they just miss the step that wanted
/// them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Data-storage key holding the administrative hint settings.
    pub settings_key: String,

    /// Capability tags sent with every command.
    pub tags: Vec<String>,

    /// Protocol version sent with every command.
    pub version: NetworkVersion,

    /// Delay after `Connected` before requesting settings. Default: 0.
    pub settings_delay_secs: u64,

    /// Delay after `Connected` before the hint refresh starts. Default: 3.
    pub refresh_delay_secs: u64,

    /// Wait for the hinted-locations reply before computing candidates.
    /// Default: 2.
    pub hinted_grace_secs: u64,

    /// Wait for scouting replies before requesting datapacks. Default: 5.
    pub scout_grace_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            settings_key: "APSudoku_Settings".into(),
            tags: vec!["HintGame".into()],
            version: NetworkVersion::default(),
            settings_delay_secs: 0,
            refresh_delay_secs: 3,
            hinted_grace_secs: 2,
            scout_grace_secs: 5,
        }
    }
}

impl SessionConfig {
    pub fn settings_delay(&self) -> Duration {
        Duration::from_secs(self.settings_delay_secs)
    }

    pub fn refresh_delay(&self) -> Duration {
        Duration::from_secs(self.refresh_delay_secs)
    }

    pub fn hinted_grace(&self) -> Duration {
        Duration::from_secs(self.hinted_grace_secs)
    }

    pub fn scout_grace(&self) -> Duration {
        Duration::from_secs(self.scout_grace_secs)
    }
}
