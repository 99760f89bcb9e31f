//! Codec trait and the JSON implementation used on the wire.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The command types only derive serde traits; whichever [`Codec`] the
//! caller hands in decides the byte format.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because the codec lives inside the supervisor
/// task for the whole life of the client.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T)
    -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or
    /// don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// The coordination server only speaks JSON, so this is the codec the
/// client uses in practice.
///
/// ## Example
///
/// ```rust
/// use hintforge_protocol::{ClientCommand, Codec, JsonCodec, SlotAuth};
///
/// let codec = JsonCodec;
/// let auth = SlotAuth::new("Alice", "secret").with_slot_data(false);
/// let bytes = codec.encode(&vec![ClientCommand::Connect { auth }]).unwrap();
///
/// let value: serde_json::Value = codec.decode(&bytes).unwrap();
/// assert_eq!(value[0]["cmd"], "Connect");
/// assert_eq!(value[0]["slot_data"], false);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_codec_decode_garbage_returns_decode_error() {
        let result: Result<serde_json::Value, _> =
            JsonCodec.decode(b"not json at all");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_json_codec_encode_produces_compact_json() {
        let bytes = JsonCodec.encode(&vec!["a", "b"]).unwrap();
        assert_eq!(bytes, br#"["a","b"]"#);
    }
}
