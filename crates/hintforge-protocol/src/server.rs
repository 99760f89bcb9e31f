//! Incoming commands (server → client).
//!
//! The server pushes frames holding a JSON array of records, each tagged
//! with a `cmd` name. Unlike the outgoing side, the incoming vocabulary is
//! open-ended: the server sends many commands this client does not care
//! about. [`decode_frame`] therefore decodes each record on its own, so
//! one malformed or unknown record never takes the rest of the frame down
//! with it.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{Codec, LooseId, ProtocolError};

/// Prefix of the data-storage keys holding a player's known hints
/// (`_read_hints_<team>_<slot>`).
pub const HINTS_KEY_PREFIX: &str = "_read_hints_";

/// Builds the hinted-locations key for one team/slot pair.
pub fn hints_key(team: &LooseId, slot: &LooseId) -> String {
    format!("{HINTS_KEY_PREFIX}{team}_{slot}")
}

// ---------------------------------------------------------------------------
// ServerCommand
// ---------------------------------------------------------------------------

/// One decoded record from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerCommand {
    Connected(ConnectedPacket),
    Retrieved(RetrievedPacket),
    LocationInfo(LocationInfoPacket),
    DataPackage(DataPackagePacket),
    PrintJson(PrintJsonPacket),
    SetReply(SetReplyPacket),
    /// A well-formed record with a command name this client ignores.
    Unhandled { cmd: String },
}

impl ServerCommand {
    /// Decodes one record, dispatching on its `cmd` field.
    ///
    /// # Errors
    /// `InvalidMessage` if the record is not an object or has no `cmd`;
    /// `Decode` if a known command's fields have the wrong shape.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let cmd = value
            .get("cmd")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ProtocolError::InvalidMessage(
                    "record has no `cmd` field".into(),
                )
            })?
            .to_owned();

        let command = match cmd.as_str() {
            "Connected" => Self::Connected(packet(value)?),
            "Retrieved" => Self::Retrieved(packet(value)?),
            "LocationInfo" => Self::LocationInfo(packet(value)?),
            "DataPackage" => Self::DataPackage(packet(value)?),
            "PrintJSON" => Self::PrintJson(packet(value)?),
            "SetReply" => Self::SetReply(packet(value)?),
            _ => Self::Unhandled { cmd },
        };
        Ok(command)
    }

    /// The `cmd` name, for logging.
    pub fn name(&self) -> &str {
        match self {
            Self::Connected(_) => "Connected",
            Self::Retrieved(_) => "Retrieved",
            Self::LocationInfo(_) => "LocationInfo",
            Self::DataPackage(_) => "DataPackage",
            Self::PrintJson(_) => "PrintJSON",
            Self::SetReply(_) => "SetReply",
            Self::Unhandled { cmd } => cmd,
        }
    }
}

fn packet<T: serde::de::DeserializeOwned>(
    value: Value,
) -> Result<T, ProtocolError> {
    serde_json::from_value(value).map_err(ProtocolError::Decode)
}

/// Decodes one incoming frame into its records.
///
/// The outer `Result` fails only when the frame itself is not a JSON
/// array; each inner `Result` reports on one record.
pub fn decode_frame<C: Codec>(
    codec: &C,
    data: &[u8],
) -> Result<Vec<Result<ServerCommand, ProtocolError>>, ProtocolError> {
    let records: Vec<Value> = codec.decode(data)?;
    tracing::trace!(records = records.len(), "decoded frame");
    Ok(records.into_iter().map(ServerCommand::from_value).collect())
}

// ---------------------------------------------------------------------------
// Connected
// ---------------------------------------------------------------------------

/// Sent once the server accepted `Connect`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConnectedPacket {
    /// Both location arrays must be present for either to be applied.
    #[serde(default)]
    pub checked_locations: Option<Vec<LooseId>>,
    #[serde(default)]
    pub missing_locations: Option<Vec<LooseId>>,
    /// Per-slot info keyed by slot number (as a string, JSON object keys
    /// being strings).
    #[serde(default)]
    pub slot_info: Option<BTreeMap<String, NetworkSlot>>,
    /// Every player in the room, with their team.
    #[serde(default)]
    pub players: Option<Vec<NetworkPlayer>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NetworkSlot {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub game: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NetworkPlayer {
    pub team: LooseId,
    pub slot: LooseId,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

// ---------------------------------------------------------------------------
// Retrieved / SetReply
// ---------------------------------------------------------------------------

/// Reply to `Get`: the requested data-storage keys and their values.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RetrievedPacket {
    #[serde(default)]
    pub keys: Map<String, Value>,
}

impl RetrievedPacket {
    /// Parses the settings object stored under `key`, if any.
    pub fn settings(&self, key: &str) -> Option<HintSettings> {
        self.keys.get(key).and_then(HintSettings::from_value)
    }

    /// Collects every location listed under a `_read_hints_*` key.
    ///
    /// Each such key holds an array of hint objects; only their `location`
    /// field matters here.
    pub fn hinted_locations(&self) -> Vec<LooseId> {
        self.keys
            .iter()
            .filter(|(key, _)| key.starts_with(HINTS_KEY_PREFIX))
            .filter_map(|(_, value)| value.as_array())
            .flatten()
            .filter_map(|hint| hint.get("location"))
            .filter_map(LooseId::from_value)
            .collect()
    }
}

/// Notification that a watched data-storage key changed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SetReplyPacket {
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

impl SetReplyPacket {
    /// Parses the new value as settings if `key` is the watched one.
    pub fn settings(&self, key: &str) -> Option<HintSettings> {
        if self.key != key {
            return None;
        }
        HintSettings::from_value(&self.value)
    }
}

/// Administrative hint settings stored on the server.
///
/// Parsed leniently: a missing or mistyped field is `None` rather than an
/// error, so a partially written settings object still applies what it
/// can.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HintSettings {
    pub enabled: Option<bool>,
    /// Per-difficulty integer percentages. Entries that are not arrays of
    /// integers are left out.
    pub weights: Option<BTreeMap<String, Vec<i64>>>,
}

impl HintSettings {
    /// Returns `None` unless `value` is a JSON object.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let enabled = obj.get("enabled").and_then(Value::as_bool);
        let weights = obj.get("weights").and_then(Value::as_object).map(|w| {
            w.iter()
                .filter_map(|(difficulty, values)| {
                    let ints = values
                        .as_array()?
                        .iter()
                        .map(Value::as_i64)
                        .collect::<Option<Vec<_>>>()?;
                    Some((difficulty.clone(), ints))
                })
                .collect()
        });
        Some(Self { enabled, weights })
    }
}

// ---------------------------------------------------------------------------
// LocationInfo
// ---------------------------------------------------------------------------

/// Reply to `LocationScouts`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LocationInfoPacket {
    #[serde(default)]
    pub locations: Vec<NetworkItem>,
}

/// An item placed at a location.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NetworkItem {
    #[serde(default)]
    pub item: Option<LooseId>,
    #[serde(default)]
    pub location: Option<LooseId>,
    #[serde(default)]
    pub player: Option<LooseId>,
    /// Classification bits; `1` marks a progression item.
    #[serde(default)]
    pub flags: Option<i64>,
}

// ---------------------------------------------------------------------------
// DataPackage
// ---------------------------------------------------------------------------

/// Reply to `GetDataPackage`. `data` holds `{"games": {<game>: {...}}}`.
///
/// Kept as raw JSON; the datapack cache filters and validates it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DataPackagePacket {
    pub data: Value,
}

// ---------------------------------------------------------------------------
// PrintJSON
// ---------------------------------------------------------------------------

/// A rich-text message; hints arrive as `type: "Hint"`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PrintJsonPacket {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub data: Vec<JsonMessagePart>,
    #[serde(default)]
    pub item: Option<NetworkItem>,
}

/// One text fragment of a `PrintJSON` message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JsonMessagePart {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl PrintJsonPacket {
    /// Extracts the hint carried by a `type: "Hint"` message.
    ///
    /// Returns `None` for other message types and for hints without an
    /// `item` object.
    pub fn hint(&self) -> Option<HintRecord> {
        if self.kind.as_deref() != Some("Hint") {
            return None;
        }
        let item = self.item.as_ref()?;
        let players = self
            .data
            .iter()
            .filter(|part| part.kind.as_deref() == Some("player_id"))
            .filter_map(|part| part.text.clone())
            .collect();
        Some(HintRecord {
            item_id: item.item.clone(),
            location_id: item.location.clone(),
            players,
        })
    }
}

/// The ids a hint message refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintRecord {
    pub item_id: Option<LooseId>,
    pub location_id: Option<LooseId>,
    /// Slot numbers in message order.
    pub players: Vec<String>,
}

impl HintRecord {
    /// The slot receiving the item: the first player mentioned.
    pub fn receiver(&self) -> Option<&str> {
        self.players.first().map(String::as_str)
    }

    /// The slot whose world holds the item: the last player mentioned,
    /// when more than one is.
    pub fn sender(&self) -> Option<&str> {
        if self.players.len() > 1 {
            self.players.last().map(String::as_str)
        } else {
            None
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
