//! Unified error type for the Hintforge client.

use hintforge_protocol::ProtocolError;
use hintforge_session::SessionError;
use hintforge_store::StoreError;
use hintforge_transport::TransportError;

/// Cached credentials that cannot be used for a reconnect.
#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    /// A required value was never stored.
    #[error("no cached {0}")]
    Missing(&'static str),

    /// The stored address is not `host:port` with a numeric port.
    #[error("invalid host:port {0:?}")]
    InvalidFormat(String),

    /// The credentials could not be written.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Top-level error that wraps all crate-specific errors.
///
/// The supervisor itself never returns these to the process; they show
/// up from the handle (when the supervisor task is gone) and from the
/// lower-level helpers re-exported here.
#[derive(Debug, thiserror::Error)]
pub enum HintforgeError {
    /// A transport-level error (connect, send, recv, ping).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Durable state could not be read or written.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A reward could not be granted.
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Credentials(#[from] CredentialsError),

    /// The supervisor task has stopped.
    #[error("connection supervisor is no longer running")]
    SupervisorGone,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    // =====================================================================
    // CredentialsError
    // =====================================================================

    #[test]
    fn test_credentials_error_messages_name_the_problem() {
        assert_eq!(
            CredentialsError::Missing("host_port").to_string(),
            "no cached host_port"
        );
        assert_eq!(
            CredentialsError::InvalidFormat("localhost:port".into()).to_string(),
            "invalid host:port \"localhost:port\""
        );
    }

    #[test]
    fn test_credentials_store_error_keeps_store_message() {
        let err = CredentialsError::from(StoreError::Malformed("pending_hints".into()));
        assert!(matches!(err, CredentialsError::Store(StoreError::Malformed(_))));
        assert_eq!(err.to_string(), "malformed data: pending_hints");
    }

    // =====================================================================
    // HintforgeError
    // =====================================================================

    fn lift<E>(result: Result<(), E>) -> Result<(), HintforgeError>
    where
        HintforgeError: From<E>,
    {
        result?;
        Ok(())
    }

    #[test]
    fn test_question_mark_lifts_layer_errors_transparently() {
        let err = lift(Err(TransportError::Timeout(Duration::from_secs(10)))).unwrap_err();
        assert!(matches!(err, HintforgeError::Transport(TransportError::Timeout(_))));
        assert_eq!(err.to_string(), "timed out after 10s");

        let err = lift(Err(CredentialsError::Missing("slot_name"))).unwrap_err();
        assert!(matches!(
            err,
            HintforgeError::Credentials(CredentialsError::Missing("slot_name"))
        ));
        assert_eq!(err.to_string(), "no cached slot_name");

        let err = lift(Err(SessionError::UnknownDifficulty("Nightmare".into()))).unwrap_err();
        assert_eq!(err.to_string(), "unknown difficulty: Nightmare");
    }

    #[test]
    fn test_protocol_error_lifts_into_protocol_variant() {
        let err = HintforgeError::from(ProtocolError::InvalidMessage("record has no `cmd` field".into()));
        assert!(matches!(err, HintforgeError::Protocol(_)));
        assert!(err.to_string().contains("record has no `cmd` field"));
    }

    #[test]
    fn test_supervisor_gone_message() {
        assert_eq!(
            HintforgeError::SupervisorGone.to_string(),
            "connection supervisor is no longer running"
        );
    }
}
