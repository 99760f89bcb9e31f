//! Error types for the session layer.

/// Errors from reward selection and hint granting.
///
/// All of these are expected outcomes of playing the game, not faults:
/// the supervisor logs them and carries on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// No weights are configured for the requested difficulty.
    #[error("unknown difficulty: {0}")]
    UnknownDifficulty(String),

    /// The weighted draw landed on the "no hint" bucket.
    #[error("no hint triggered")]
    NoHintTriggered,

    /// Both the progression and the other bucket are empty.
    #[error("no available rewards in the pool")]
    NoAvailableRewards,

    /// No location scouting replies have arrived yet this session.
    #[error("no progression records known")]
    NoProgressionRecords,

    /// The server administrator turned hints off.
    #[error("hints are disabled on the server")]
    HintsDisabled,

    /// A location id that is not an integer cannot be scouted.
    #[error("invalid location value: {0}")]
    InvalidLocation(String),
}
