//! Client configuration.

use memchunk_store::ServerAddr;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default largest number of bytes stored under one physical key.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 1_000_000;

/// Default serialized size from which values are flagged for compression.
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 20_000;

/// Default server-side expiry of a lock entry.
pub const DEFAULT_LOCK_EXPIRY: Duration = Duration::from_secs(30);

/// How the backend routes keys to servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BackendKind {
    /// The backend hashes and prefixes keys itself, consistently across its
    /// servers. Keys are sent unchanged.
    SelfHashing,
    /// The caller must pre-hash keys so that independent clients place the
    /// same key on the same server.
    #[default]
    ExternalHashing,
}

/// Configuration for opening a [`crate::Client`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Servers to add to the pool at startup.
    pub servers: Vec<ServerAddr>,

    /// Key routing behavior of the backend.
    pub backend: BackendKind,

    /// Key namespace prefix.
    pub prefix: String,

    /// Whether to ask the backend to compress large values.
    pub compression: bool,

    /// Serialized size from which values are flagged for compression.
    pub compression_threshold: usize,

    /// Whether values larger than one chunk may be split across keys.
    pub large_items: bool,

    /// Whether the backend should keep connections open between requests.
    pub persistent: bool,

    /// Largest number of bytes stored under one physical key.
    pub max_chunk_size: usize,

    /// Server-side expiry of a lock entry.
    pub lock_expiry: Duration,

    /// Backoff between lock attempts.
    pub lock_backoff: LockBackoff,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            backend: BackendKind::default(),
            prefix: String::new(),
            compression: false,
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            large_items: true,
            persistent: true,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            lock_expiry: DEFAULT_LOCK_EXPIRY,
            lock_backoff: LockBackoff::default(),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a server with the default weight.
    #[must_use]
    pub fn server(mut self, host: impl Into<String>, port: u16) -> Self {
        self.servers.push(ServerAddr::new(host, port));
        self
    }

    /// Adds a server with an explicit weight.
    #[must_use]
    pub fn weighted_server(mut self, host: impl Into<String>, port: u16, weight: u32) -> Self {
        self.servers
            .push(ServerAddr::new(host, port).with_weight(weight));
        self
    }

    /// Sets the backend routing behavior.
    #[must_use]
    pub const fn backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Sets the key namespace prefix.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Enables compression for values of at least `threshold` bytes.
    #[must_use]
    pub const fn compression(mut self, enabled: bool, threshold: usize) -> Self {
        self.compression = enabled;
        self.compression_threshold = threshold;
        self
    }

    /// Sets whether oversized values may be chunked.
    #[must_use]
    pub const fn large_items(mut self, value: bool) -> Self {
        self.large_items = value;
        self
    }

    /// Sets whether connections are persistent.
    #[must_use]
    pub const fn persistent(mut self, value: bool) -> Self {
        self.persistent = value;
        self
    }

    /// Sets the chunk size limit.
    #[must_use]
    pub const fn max_chunk_size(mut self, size: usize) -> Self {
        self.max_chunk_size = size;
        self
    }

    /// Sets the lock entry expiry.
    #[must_use]
    pub const fn lock_expiry(mut self, expiry: Duration) -> Self {
        self.lock_expiry = expiry;
        self
    }

    /// Sets the lock backoff.
    #[must_use]
    pub const fn lock_backoff(mut self, backoff: LockBackoff) -> Self {
        self.lock_backoff = backoff;
        self
    }

    /// Returns true if a value of `len` serialized bytes should carry the
    /// compression bit.
    #[must_use]
    pub const fn should_compress(&self, len: usize) -> bool {
        self.compression && len >= self.compression_threshold
    }
}

/// Exponential backoff between lock attempts.
///
/// The delay before retry `attempt` (0-based) is
/// `min(initial * 2^attempt, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockBackoff {
    /// Delay after the first failed attempt.
    pub initial: Duration,
    /// Upper bound on any delay.
    pub max: Duration,
}

impl Default for LockBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(10),
            max: Duration::from_millis(100),
        }
    }
}

impl LockBackoff {
    /// Calculates the delay after failed attempt number `attempt`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial.saturating_mul(factor).min(self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.servers.is_empty());
        assert_eq!(config.backend, BackendKind::ExternalHashing);
        assert!(config.large_items);
        assert!(!config.compression);
        assert_eq!(config.max_chunk_size, 1_000_000);
        assert_eq!(config.lock_expiry, Duration::from_secs(30));
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .server("cache-1", 11211)
            .weighted_server("cache-2", 11211, 3)
            .backend(BackendKind::SelfHashing)
            .prefix("app:")
            .large_items(false)
            .persistent(false)
            .max_chunk_size(1024);

        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.servers[1].weight, 3);
        assert_eq!(config.backend, BackendKind::SelfHashing);
        assert_eq!(config.prefix, "app:");
        assert!(!config.large_items);
        assert!(!config.persistent);
        assert_eq!(config.max_chunk_size, 1024);
    }

    #[test]
    fn compression_threshold() {
        let config = Config::new().compression(true, 100);
        assert!(!config.should_compress(99));
        assert!(config.should_compress(100));
        assert!(!Config::new().should_compress(usize::MAX));
    }

    #[test]
    fn backoff_doubles_then_caps() {
        let backoff = LockBackoff::default();
        assert_eq!(backoff.delay_for_attempt(0), Duration::from_millis(10));
        assert_eq!(backoff.delay_for_attempt(1), Duration::from_millis(20));
        assert_eq!(backoff.delay_for_attempt(2), Duration::from_millis(40));
        assert_eq!(backoff.delay_for_attempt(3), Duration::from_millis(80));
        assert_eq!(backoff.delay_for_attempt(4), Duration::from_millis(100));
        assert_eq!(backoff.delay_for_attempt(64), Duration::from_millis(100));
    }
}
