//! Error types for store operations.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while talking to the store.
///
/// Ordinary "miss" outcomes (key absent, `add` on an existing key) are not
/// errors; they come back as `Ok(None)` or `Ok(false)`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A server in the pool could not be reached.
    #[error("server unreachable: {host}:{port}")]
    ServerUnreachable {
        /// Host of the unreachable server.
        host: String,
        /// Port of the unreachable server.
        port: u16,
    },

    /// The client has no servers to send the request to.
    #[error("no servers in pool")]
    NoServers,

    /// The backend rejected the request.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Creates a server unreachable error.
    pub fn unreachable(host: impl Into<String>, port: u16) -> Self {
        Self::ServerUnreachable {
            host: host.into(),
            port,
        }
    }

    /// Creates a generic backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_display() {
        let err = StoreError::unreachable("cache-1", 11211);
        assert_eq!(err.to_string(), "server unreachable: cache-1:11211");
    }
}
