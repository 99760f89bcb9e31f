//! # Hintforge
//!
//! A reconnecting client that plugs a puzzle game into a multiworld
//! randomizer server: every solved puzzle may earn a hint about where an
//! item sits in some player's world.
//!
//! The crate ties the layers together:
//!
//! ```text
//! SupervisorHandle → ConnectionSupervisor (actor) → SessionClient (state machine)
//!                          │                              │
//!                     socket driver                 DataCache / weights
//!                     (Connection)                  PendingHintQueue
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hintforge::prelude::*;
//!
//! # async fn run() -> Result<(), HintforgeError> {
//! init_logging("info");
//! let client = ConnectionSupervisor::builder()
//!     .config(ClientConfig::default())
//!     .spawn(WebSocketConnector);
//!
//! client.connect("localhost", 38281, "Alice", "").await?;
//! // ... later, when the player solves a puzzle:
//! let outcome = client.puzzle_completed("Hard").await?;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```

mod config;
mod driver;
mod error;
mod logging;
mod notice;
mod state;
mod supervisor;

pub use config::ClientConfig;
pub use error::{CredentialsError, HintforgeError};
pub use logging::init_logging;
pub use notice::{ChannelNoticeSink, LogNoticeSink, NoticeSink};
pub use state::{
    ConnectionState, Credentials, HOST_PORT_KEY, PASSWORD_KEY, SLOT_NAME_KEY, parse_host_port,
};
pub use supervisor::{ConnectionSupervisor, RewardOutcome, SupervisorBuilder, SupervisorHandle};

/// Re-exports of the types most embedders need.
pub mod prelude {
    pub use crate::{
        ChannelNoticeSink, ClientConfig, ConnectionState, ConnectionSupervisor, Credentials,
        CredentialsError, HintforgeError, LogNoticeSink, NoticeSink, RewardOutcome,
        SupervisorBuilder, SupervisorHandle, init_logging,
    };
    pub use hintforge_protocol::{ClientCommand, LooseId, ServerCommand};
    pub use hintforge_session::{DifficultyWeights, Notice, SessionConfig, SessionError, SessionSnapshot};
    pub use hintforge_store::{DataCache, JsonFileStore, KeyValueStore, LeftoverPolicy, MemoryStore};
    pub use hintforge_transport::{Connection, Connector, TransportError, WebSocketConnector};
}
