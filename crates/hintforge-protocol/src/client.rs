//! Outgoing commands (client → server).

use serde::{Deserialize, Serialize};

use crate::{Codec, ProtocolError, SlotAuth};

/// A command the client sends to the coordination server.
///
/// `#[serde(tag = "cmd")]` produces the internally tagged records the
/// server expects, and `#[serde(flatten)]` inlines the envelope fields
/// next to the command's own fields:
///
/// ```text
/// {"cmd":"Get","keys":["APSudoku_Settings"],"password":"…","name":"…",…}
/// ```
///
/// Commands also deserialize, which is how queued hint requests come
/// back from durable storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum ClientCommand {
    /// Opens the slot session. Sent once, right after the socket opens.
    Connect {
        #[serde(flatten)]
        auth: SlotAuth,
    },

    /// Reads values from the server's data storage.
    Get {
        keys: Vec<String>,
        #[serde(flatten)]
        auth: SlotAuth,
    },

    /// Subscribes to change notifications (`SetReply`) for the given keys.
    SetNotify {
        keys: Vec<String>,
        #[serde(flatten)]
        auth: SlotAuth,
    },

    /// Asks what sits at the given locations.
    ///
    /// With `create_as_hint = 0` the server only answers with
    /// `LocationInfo`; with `1` it also records a hint and broadcasts it.
    LocationScouts {
        locations: Vec<i64>,
        create_as_hint: u8,
        #[serde(flatten)]
        auth: SlotAuth,
    },

    /// Requests the id↔name datapacks for the given games.
    GetDataPackage {
        games: Vec<String>,
        #[serde(flatten)]
        auth: SlotAuth,
    },
}

impl ClientCommand {
    /// The `cmd` name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "Connect",
            Self::Get { .. } => "Get",
            Self::SetNotify { .. } => "SetNotify",
            Self::LocationScouts { .. } => "LocationScouts",
            Self::GetDataPackage { .. } => "GetDataPackage",
        }
    }

    /// The envelope this command was built with.
    pub fn auth(&self) -> &SlotAuth {
        match self {
            Self::Connect { auth }
            | Self::Get { auth, .. }
            | Self::SetNotify { auth, .. }
            | Self::LocationScouts { auth, .. }
            | Self::GetDataPackage { auth, .. } => auth,
        }
    }
}

/// Encodes a batch of commands as one text frame (a JSON array).
///
/// # Errors
/// Returns `ProtocolError::Encode` if serialization fails, or
/// `InvalidMessage` if the codec produced non-UTF-8 output.
pub fn encode_frame<C: Codec>(
    codec: &C,
    commands: &[ClientCommand],
) -> Result<String, ProtocolError> {
    let bytes = codec.encode(&commands)?;
    String::from_utf8(bytes).map_err(|e| {
        ProtocolError::InvalidMessage(format!("frame is not UTF-8: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::JsonCodec;

    fn auth() -> SlotAuth {
        SlotAuth::new("Alice", "pw")
    }

    fn to_json(cmd: &ClientCommand) -> Value {
        serde_json::to_value(cmd).unwrap()
    }

    #[test]
    fn test_connect_json_format_has_flattened_envelope() {
        let cmd = ClientCommand::Connect {
            auth: auth().with_slot_data(false),
        };
        assert_eq!(
            to_json(&cmd),
            json!({
                "cmd": "Connect",
                "password": "pw",
                "name": "Alice",
                "version": {"major": 0, "minor": 5, "build": 0, "class": "Version"},
                "tags": ["HintGame"],
                "items_handling": 0,
                "uuid": "",
                "game": "",
                "slot_data": false
            })
        );
    }

    #[test]
    fn test_location_scouts_json_format() {
        let cmd = ClientCommand::LocationScouts {
            locations: vec![5, 6],
            create_as_hint: 0,
            auth: auth(),
        };
        let json = to_json(&cmd);
        assert_eq!(json["cmd"], "LocationScouts");
        assert_eq!(json["locations"], json!([5, 6]));
        assert_eq!(json["create_as_hint"], 0);
        assert_eq!(json["slot_data"], true);
    }

    #[test]
    fn test_get_data_package_json_format() {
        let cmd = ClientCommand::GetDataPackage {
            games: vec!["Zelda".into(), "Metroid".into()],
            auth: auth(),
        };
        let json = to_json(&cmd);
        assert_eq!(json["cmd"], "GetDataPackage");
        assert_eq!(json["games"], json!(["Zelda", "Metroid"]));
        assert_eq!(json["name"], "Alice");
    }

    #[test]
    fn test_client_command_deserializes_from_stored_form() {
        // Pending hints are persisted in wire form and read back at start.
        let cmd = ClientCommand::LocationScouts {
            locations: vec![42],
            create_as_hint: 1,
            auth: auth(),
        };
        let stored = serde_json::to_string(&cmd).unwrap();
        let restored: ClientCommand = serde_json::from_str(&stored).unwrap();
        assert_eq!(restored, cmd);
        assert_eq!(restored.auth().name, "Alice");
    }

    #[test]
    fn test_client_command_name_matches_tag() {
        let cmd = ClientCommand::SetNotify {
            keys: vec!["k".into()],
            auth: auth(),
        };
        assert_eq!(cmd.name(), "SetNotify");
        assert_eq!(to_json(&cmd)["cmd"], cmd.name());
    }

    #[test]
    fn test_encode_frame_wraps_commands_in_array() {
        let frame = encode_frame(
            &JsonCodec,
            &[
                ClientCommand::Get {
                    keys: vec!["a".into()],
                    auth: auth(),
                },
                ClientCommand::SetNotify {
                    keys: vec!["a".into()],
                    auth: auth(),
                },
            ],
        )
        .unwrap();

        let value: Value = serde_json::from_str(&frame).unwrap();
        let records = value.as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["cmd"], "Get");
        assert_eq!(records[1]["cmd"], "SetNotify");
        assert!(!frame.contains('\n'));
    }
}
