//! Storage error types.

use std::path::PathBuf;

/// Errors raised while reading or writing durable state.
///
/// None of these are fatal to the client: callers log them and keep the
/// in-memory state they already have.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A file could not be read or written.
    #[error("storage I/O failed at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A value could not be converted to or from JSON.
    #[error("serialization failed: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Stored or received data has an unexpected shape.
    #[error("malformed data: {0}")]
    Malformed(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
