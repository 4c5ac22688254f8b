//! Store client trait definition.

use crate::error::StoreResult;
use crate::server::ServerAddr;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// An entry returned by the store: the stored bytes and the flags integer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Stored bytes.
    pub value: Vec<u8>,
    /// Flags integer stored alongside the value.
    pub flags: u32,
}

impl Entry {
    /// Creates a new entry.
    pub fn new(value: impl Into<Vec<u8>>, flags: u32) -> Self {
        Self {
            value: value.into(),
            flags,
        }
    }
}

/// Per-server statistics, keyed by `host:port` and then by stat name.
pub type ServerStats = BTreeMap<String, BTreeMap<String, String>>;

/// A connected client for a memcache-style server pool.
///
/// All keys are **physical** keys. Expiry of `Duration::ZERO` means the
/// entry never expires.
///
/// # Invariants
///
/// - `add` is atomic: of several concurrent `add` calls for one key, at most
///   one returns `Ok(true)` while the entry exists
/// - `get_multi` is a single round trip regardless of the key count
/// - Values and flags come back exactly as written
/// - Clients must be `Send + Sync`
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - Simulated pool for tests and tooling
pub trait StoreClient: Send + Sync {
    /// Adds a server to the pool.
    ///
    /// Returns `Ok(false)` if the server could not be reached.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot accept servers at all.
    fn add_server(&self, server: &ServerAddr, persistent: bool) -> StoreResult<bool>;

    /// Removes `host:port` from the pool.
    ///
    /// Returns `false` if no such server was in the pool.
    fn remove_server(&self, host: &str, port: u16) -> bool;

    /// Configures the namespace prefix the backend applies to every key.
    ///
    /// Only self-hashing backends use this; the default does nothing.
    fn configure_prefix(&self, _prefix: &str) {}

    /// Fetches one entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool is empty or a server is unreachable.
    fn get(&self, key: &str) -> StoreResult<Option<Entry>>;

    /// Fetches many entries in one round trip.
    ///
    /// Missing keys are simply absent from the returned map.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool is empty or a server is unreachable.
    fn get_multi(&self, keys: &[String]) -> StoreResult<HashMap<String, Entry>>;

    /// Stores an entry unconditionally.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool is empty or a server is unreachable.
    fn set(&self, key: &str, value: &[u8], flags: u32, expire: Duration) -> StoreResult<bool>;

    /// Stores an entry only if the key does not exist (atomic insert-if-absent).
    ///
    /// # Errors
    ///
    /// Returns an error if the pool is empty or a server is unreachable.
    fn add(&self, key: &str, value: &[u8], flags: u32, expire: Duration) -> StoreResult<bool>;

    /// Stores an entry only if the key already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool is empty or a server is unreachable.
    fn replace(&self, key: &str, value: &[u8], flags: u32, expire: Duration)
        -> StoreResult<bool>;

    /// Deletes an entry. Returns `Ok(false)` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool is empty or a server is unreachable.
    fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Invalidates every entry on every server.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool is empty or a server is unreachable.
    fn flush(&self) -> StoreResult<bool>;

    /// Returns per-server statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool is empty or a server is unreachable.
    fn stats(&self) -> StoreResult<ServerStats>;
}
