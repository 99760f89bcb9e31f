//! Connection state and cached credentials.

use std::fmt;

use hintforge_store::KeyValueStore;
use serde::{Deserialize, Serialize};

use crate::CredentialsError;

// ---------------------------------------------------------------------------
// ConnectionState
// ---------------------------------------------------------------------------

/// The supervisor's externally visible status.
///
/// ```text
/// Disconnected ──connect──→ Connecting ──Connected reply──→ Connected
///                               │                              │
///                        connect timeout                 socket closed
///                               ▼                              ▼
///                           TimedOut                     Disconnected
/// ```
///
/// `disconnect` leads to `Disconnected` from any state. `TimedOut` and
/// `Disconnected` are both valid starting points for a reconnect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    TimedOut,
}

impl ConnectionState {
    /// `true` while a new `connect` would be refused.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::TimedOut => write!(f, "TimedOut"),
        }
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

pub const HOST_PORT_KEY: &str = "host_port";
pub const SLOT_NAME_KEY: &str = "slot_name";
pub const PASSWORD_KEY: &str = "password";

/// Where and as whom to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub host: String,
    pub port: u16,
    pub slot_name: String,
    pub password: String,
}

impl Credentials {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        slot_name: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            slot_name: slot_name.into(),
            password: password.into(),
        }
    }

    pub fn host_port(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }

    /// Writes all three values to `store`.
    ///
    /// # Errors
    /// Returns the first store error.
    pub fn save(&self, store: &dyn KeyValueStore) -> Result<(), CredentialsError> {
        store.set(HOST_PORT_KEY, &self.host_port())?;
        store.set(SLOT_NAME_KEY, &self.slot_name)?;
        store.set(PASSWORD_KEY, &self.password)?;
        Ok(())
    }

    /// Reads credentials written by [`save`](Self::save).
    ///
    /// # Errors
    /// `Missing` if a value was never stored, `InvalidFormat` if the
    /// address does not parse.
    pub fn load(store: &dyn KeyValueStore) -> Result<Self, CredentialsError> {
        let host_port = store
            .get(HOST_PORT_KEY)
            .ok_or(CredentialsError::Missing(HOST_PORT_KEY))?;
        let slot_name = store
            .get(SLOT_NAME_KEY)
            .ok_or(CredentialsError::Missing(SLOT_NAME_KEY))?;
        let password = store
            .get(PASSWORD_KEY)
            .ok_or(CredentialsError::Missing(PASSWORD_KEY))?;
        let (host, port) = parse_host_port(&host_port)?;
        Ok(Self {
            host,
            port,
            slot_name,
            password,
        })
    }
}

/// Splits `host:port`. There must be exactly one colon and the port must
/// be a number.
///
/// # Errors
/// `InvalidFormat` otherwise.
pub fn parse_host_port(raw: &str) -> Result<(String, u16), CredentialsError> {
    let invalid = || CredentialsError::InvalidFormat(raw.to_owned());
    let mut parts = raw.split(':');
    let (Some(host), Some(port), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };
    let port = port.parse::<u16>().map_err(|_| invalid())?;
    Ok((host.to_owned(), port))
}

#[cfg(test)]
mod tests {
    use hintforge_store::MemoryStore;

    use super::*;

    // =====================================================================
    // parse_host_port
    // =====================================================================

    #[test]
    fn test_parse_host_port_valid() {
        assert_eq!(
            parse_host_port("archipelago.gg:38281").unwrap(),
            ("archipelago.gg".to_string(), 38281)
        );
    }

    #[test]
    fn test_parse_host_port_missing_colon_fails() {
        assert!(matches!(
            parse_host_port("localhost"),
            Err(CredentialsError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_parse_host_port_non_numeric_port_fails() {
        assert!(parse_host_port("localhost:abc").is_err());
        assert!(parse_host_port("localhost:").is_err());
        assert!(parse_host_port("localhost:99999").is_err());
    }

    #[test]
    fn test_parse_host_port_extra_colon_fails() {
        assert!(parse_host_port("a:1:2").is_err());
        assert!(parse_host_port("::1:38281").is_err());
    }

    // =====================================================================
    // Credentials
    // =====================================================================

    #[test]
    fn test_credentials_save_then_load() {
        let store = MemoryStore::new();
        let creds = Credentials::new("localhost", 38281, "Alice", "pw");
        creds.save(&store).unwrap();

        assert_eq!(store.get(HOST_PORT_KEY).as_deref(), Some("localhost:38281"));
        assert_eq!(Credentials::load(&store).unwrap(), creds);
    }

    #[test]
    fn test_credentials_load_missing_value() {
        let store = MemoryStore::new();
        store.set(HOST_PORT_KEY, "localhost:1").unwrap();
        assert!(matches!(
            Credentials::load(&store),
            Err(CredentialsError::Missing(SLOT_NAME_KEY))
        ));
    }

    #[test]
    fn test_credentials_url() {
        let creds = Credentials::new("example.org", 1234, "A", "");
        assert_eq!(creds.url(), "ws://example.org:1234");
    }

    #[test]
    fn test_connection_state_display_and_busy() {
        assert_eq!(ConnectionState::TimedOut.to_string(), "TimedOut");
        assert!(ConnectionState::Connecting.is_busy());
        assert!(ConnectionState::Connected.is_busy());
        assert!(!ConnectionState::TimedOut.is_busy());
        assert!(!ConnectionState::default().is_busy());
    }
}
