//! Wire protocol for Hintforge.
//!
//! This crate defines the "language" the client and the coordination
//! server speak:
//!
//! - **Outgoing** ([`ClientCommand`], [`SlotAuth`]): the five commands the
//!   client sends, each carrying the connection envelope.
//! - **Incoming** ([`ServerCommand`] and its packet structs): the six
//!   commands the client reacts to, plus a catch-all for the rest.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how commands become bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! Every frame is a JSON array of command records, in both directions.
//!
//! ```text
//! Transport (text frames) → Protocol (ServerCommand) → Session (state)
//! ```

mod client;
mod codec;
mod error;
mod server;
mod types;

pub use client::{ClientCommand, encode_frame};
pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use server::{
    ConnectedPacket, DataPackagePacket, HINTS_KEY_PREFIX, HintRecord,
    HintSettings, JsonMessagePart, LocationInfoPacket, NetworkItem,
    NetworkPlayer, NetworkSlot, PrintJsonPacket, RetrievedPacket,
    ServerCommand, SetReplyPacket, decode_frame, hints_key,
};
pub use types::{LooseId, NetworkVersion, SlotAuth};
