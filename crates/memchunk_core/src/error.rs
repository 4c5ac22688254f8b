//! Error types for memchunk core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in memchunk core operations.
///
/// Oversized values, failed chunk writes and corrupt chunked entries are not
/// errors: they are reported as `false` or as an absent value. Only
/// conditions the caller cannot recover from locally surface here.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Store client error that is not a failover event.
    #[error("store error: {0}")]
    Store(#[from] memchunk_store::StoreError),

    /// Value serialization error.
    #[error("codec error: {0}")]
    Codec(#[from] memchunk_codec::CodecError),

    /// No configured server could be reached at startup.
    #[error("configuration failure: {message}")]
    ConfigurationFailure {
        /// Description of the failure.
        message: String,
    },

    /// Every server has dropped out of the active pool.
    #[error("no servers available")]
    NoServersAvailable,

    /// A persisted client state has an unexpected schema version.
    #[error("state version mismatch: expected v{expected}, found v{found}")]
    StateVersionMismatch {
        /// Version this build understands.
        expected: u16,
        /// Version found in the persisted state.
        found: u16,
    },
}

impl CoreError {
    /// Creates a configuration failure error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationFailure {
            message: message.into(),
        }
    }

    /// Returns true if the error means the server pool is unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigurationFailure { .. }
                | Self::NoServersAvailable
                | Self::StateVersionMismatch { .. }
        )
    }
}
