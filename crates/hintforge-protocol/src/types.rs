//! Shared protocol types: identifiers and the connection envelope.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// LooseId
// ---------------------------------------------------------------------------

/// An identifier that the server may send as a JSON integer or a string.
///
/// Location ids, item ids, slot numbers and team numbers all show up in
/// both forms depending on which packet carries them. `LooseId` keeps the
/// textual form: integers are printed in decimal and strings are kept as
/// sent, so `5` and `"5"` compare equal while `"005"` does not. Use
/// [`LooseId::canonical`] where numeric equivalence matters.
///
/// Serializes as a JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LooseId(String);

impl LooseId {
    /// Wraps an already-stringified id.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the id as an integer, if it is numeric.
    pub fn as_i64(&self) -> Option<i64> {
        self.0.trim().parse().ok()
    }

    /// Returns the decimal form of a numeric id (`"007"` becomes `"7"`),
    /// or `None` for non-numeric ids.
    pub fn canonical(&self) -> Option<String> {
        self.as_i64().map(|n| n.to_string())
    }

    /// Builds a `LooseId` from an arbitrary JSON value.
    ///
    /// Integers and strings are accepted; anything else (floats, objects,
    /// null) yields `None`.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(Self(s.clone())),
            serde_json::Value::Number(n) => {
                n.as_i64().map(|n| Self(n.to_string())).or_else(|| {
                    n.as_u64().map(|n| Self(n.to_string()))
                })
            }
            _ => None,
        }
    }
}

impl fmt::Display for LooseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for LooseId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

impl From<&str> for LooseId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for LooseId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Serialize for LooseId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for LooseId {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Self, D::Error> {
        struct LooseIdVisitor;

        impl Visitor<'_> for LooseIdVisitor {
            type Value = LooseId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an integer or a string id")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<LooseId, E> {
                Ok(LooseId(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<LooseId, E> {
                Ok(LooseId(v.to_string()))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<LooseId, E> {
                Ok(LooseId(v.to_owned()))
            }

            fn visit_string<E: de::Error>(
                self,
                v: String,
            ) -> Result<LooseId, E> {
                Ok(LooseId(v))
            }
        }

        deserializer.deserialize_any(LooseIdVisitor)
    }
}

// ---------------------------------------------------------------------------
// Connection envelope
// ---------------------------------------------------------------------------

/// Protocol version announced by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkVersion {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    /// Always `"Version"`; the server uses it to recognize the object.
    #[serde(rename = "class")]
    pub class: String,
}

impl Default for NetworkVersion {
    fn default() -> Self {
        Self {
            major: 0,
            minor: 5,
            build: 0,
            class: "Version".into(),
        }
    }
}

/// The fixed envelope every outgoing command carries.
///
/// The server identifies the slot from `name` and `password` on each
/// command, so the envelope is repeated rather than negotiated once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAuth {
    pub password: String,
    pub name: String,
    pub version: NetworkVersion,
    pub tags: Vec<String>,
    /// Bitmask of item kinds the client wants to receive. Always 0 here:
    /// the client never receives items.
    pub items_handling: u8,
    pub uuid: String,
    pub game: String,
    pub slot_data: bool,
}

impl SlotAuth {
    /// Builds an envelope with the default version and `HintGame` tag.
    ///
    /// `slot_data` defaults to `true`; only `Connect` turns it off.
    pub fn new(name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            name: name.into(),
            version: NetworkVersion::default(),
            tags: vec!["HintGame".into()],
            items_handling: 0,
            uuid: String::new(),
            game: String::new(),
            slot_data: true,
        }
    }

    pub fn with_version(mut self, version: NetworkVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_slot_data(mut self, slot_data: bool) -> Self {
        self.slot_data = slot_data;
        self
    }
}

// =========================================================================
// Tests
// =========================================================================
