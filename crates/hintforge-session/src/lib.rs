//! Session state and game rules for Hintforge.
//!
//! One [`SessionClient`] exists per accepted connection. It tracks:
//!
//! 1. **Roster** ([`Roster`]): every slot's name, game and team
//! 2. **Locations** ([`LocationSets`]): checked, missing, hinted and
//!    candidate locations, plus the scouted [`ProgressionRecord`]s
//! 3. **Settings**: whether hints are enabled and the per-difficulty
//!    [`DifficultyWeights`]
//!
//! and turns each incoming server command into [`Effect`]s for the
//! supervisor to perform.
//!
//! # How it fits in the stack
//!
//! ```text
//! Supervisor (above)  ← runs effects: sends, timers, notices, disconnects
//!     ↕
//! Session Layer (this crate)  ← pure state machine, no I/O
//!     ↕
//! Protocol + Store (below)  ← command types, datapack cache
//! ```

mod client;
mod config;
mod error;
mod hint;
mod locations;
mod reward;
mod roster;

pub use client::{Effect, FollowUp, Notice, SessionClient, SessionDeps, SessionSnapshot};
pub use config::SessionConfig;
pub use error::SessionError;
pub use hint::{HintMessage, format_hint};
pub use locations::{LocationSets, PROGRESSION_FLAG, ProgressionLog, ProgressionRecord};
pub use reward::{DifficultyWeights, HintWeights, select_reward};
pub use roster::{Roster, SlotEntry};
