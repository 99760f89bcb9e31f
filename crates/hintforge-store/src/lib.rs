//! Durable state for the Hintforge client.
//!
//! - [`KeyValueStore`] ([`JsonFileStore`], [`MemoryStore`]): small string
//!   values such as cached credentials.
//! - [`DataCache`]: per-game id→name tables built from server datapacks.
//! - [`PendingHintQueue`]: hint requests waiting for a connection.
//!
//! Nothing here talks to the network. The session and supervisor layers
//! decide when to read and write; this crate only knows how.

mod datapack;
mod error;
mod kv;
mod pending;

pub use datapack::{AGGREGATE_FILE, DATAPACK_DIR, DataCache, DataPack, GameDataPackage};
pub use error::StoreError;
pub use kv::{JsonFileStore, KeyValueStore, MemoryStore};
pub use pending::{
    DispatchSummary, LeftoverPolicy, PENDING_HINTS_KEY, PendingHint, PendingHintQueue,
};
