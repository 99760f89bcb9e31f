//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means a frame (or one record inside a frame)
//! could not be turned into a command. The session layer drops the
//! offending record and keeps reading.

/// Errors that can occur while encoding or decoding commands.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a command into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (malformed JSON, or a record whose fields
    /// have the wrong shape for its command name).
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The input parsed as JSON but breaks a protocol rule, such as a
    /// record without a `cmd` field.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
