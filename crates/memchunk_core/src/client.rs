//! Client facade.

use crate::chunked::{ChunkedStore, NonexistenceCache};
use crate::config::{BackendKind, Config};
use crate::error::{CoreError, CoreResult};
use crate::failover::Pool;
use crate::key::{encoder_for, KeyEncoder};
use crate::lock::LockTable;
use crate::multiget::Coalescer;
use crate::state::ClientState;
use crate::stats::ClientStats;
use memchunk_store::{ServerAddr, ServerStats, StoreClient};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// The main client handle.
///
/// `Client` is the entry point for memchunk. It provides:
/// - Values of any size, chunked across keys when needed
/// - Batched reads in at most two round trips
/// - Distributed locks shared with every other client of the pool
/// - Failover when servers drop out
///
/// # Opening a Client
///
/// ```rust
/// use memchunk_core::{Client, Config, InMemoryStore};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let store = Arc::new(InMemoryStore::new());
/// let config = Config::new().server("127.0.0.1", 11211).prefix("app:");
/// let client = Client::open(config, store).unwrap();
///
/// client.set("greeting", "hello", Duration::ZERO).unwrap();
/// let greeting: Option<String> = client.get("greeting").unwrap();
/// assert_eq!(greeting.as_deref(), Some("hello"));
///
/// client.lock("report").unwrap();
/// // ... rebuild the report ...
/// client.unlock("report").unwrap();
/// ```
///
/// # Expiry
///
/// Every write takes an expiry; `Duration::ZERO` means the entry never
/// expires.
pub struct Client {
    /// Configuration the client was opened with.
    config: Config,
    /// Logical to physical key encoding, fixed at open.
    encoder: Arc<dyn KeyEncoder>,
    /// Store client behind failover handling.
    pool: Arc<Pool>,
    /// Chunked writes and deletes.
    values: ChunkedStore,
    /// Coalesced reads.
    reader: Coalescer,
    /// Locks held by this client.
    locks: Arc<LockTable>,
    /// Keys known to be absent.
    absent: Arc<NonexistenceCache>,
    /// Counters.
    stats: Arc<ClientStats>,
}

impl Client {
    /// Opens a client over an already-constructed store client.
    ///
    /// Adds every configured server to the store. Servers that cannot be
    /// reached are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigurationFailure`] if no server is configured
    /// or none of them can be reached.
    pub fn open(config: Config, store: Arc<dyn StoreClient>) -> CoreResult<Self> {
        if config.servers.is_empty() {
            return Err(CoreError::configuration("no servers configured"));
        }

        let encoder = encoder_for(config.backend, &config.prefix);
        if config.backend == BackendKind::SelfHashing {
            store.configure_prefix(&config.prefix);
        }

        let mut active = Vec::with_capacity(config.servers.len());
        for server in &config.servers {
            match store.add_server(server, config.persistent) {
                Ok(true) => active.push(server.clone()),
                Ok(false) => warn!(%server, "server unreachable at startup"),
                Err(e) => warn!(%server, error = %e, "failed to add server"),
            }
        }
        if active.is_empty() {
            return Err(CoreError::configuration(format!(
                "none of the {} configured servers could be reached",
                config.servers.len()
            )));
        }

        info!(
            servers = active.len(),
            backend = ?config.backend,
            "memchunk client ready"
        );

        let stats = Arc::new(ClientStats::new());
        let absent = Arc::new(NonexistenceCache::default());
        let pool = Arc::new(Pool::new(store, active, Arc::clone(&stats)));

        let values = ChunkedStore::new(
            &config,
            Arc::clone(&pool),
            Arc::clone(&encoder),
            Arc::clone(&absent),
            Arc::clone(&stats),
        );
        let reader = Coalescer::new(
            Arc::clone(&pool),
            Arc::clone(&encoder),
            Arc::clone(&absent),
            Arc::clone(&stats),
        );
        let locks = LockTable::new(
            Arc::clone(&pool),
            Arc::clone(&encoder),
            Arc::clone(&stats),
            config.lock_expiry,
            config.lock_backoff,
        );

        Ok(Self {
            config,
            encoder,
            pool,
            values,
            reader,
            locks,
            absent,
            stats,
        })
    }

    /// Reopens a client from a snapshot taken with [`Client::snapshot`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StateVersionMismatch`] if the snapshot was written
    /// by a different schema version, plus anything [`Client::open`] returns.
    pub fn restore(state: &[u8], store: Arc<dyn StoreClient>) -> CoreResult<Self> {
        let state = ClientState::decode(state)?;
        Self::open(state.into_config(), store)
    }

    /// Encodes the configuration and the still-active servers.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Codec`] if the state cannot be encoded.
    pub fn snapshot(&self) -> CoreResult<Vec<u8>> {
        ClientState::new(self.config.clone(), self.active_servers()).encode()
    }

    /// Returns the configuration the client was opened with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the key encoder in use.
    pub fn encoder(&self) -> &dyn KeyEncoder {
        self.encoder.as_ref()
    }

    /// Returns the client's counters.
    pub fn stats(&self) -> &ClientStats {
        &self.stats
    }

    /// Returns the servers still in the active pool.
    pub fn active_servers(&self) -> Vec<ServerAddr> {
        self.pool.tracker().active_servers()
    }

    // === Values ===

    /// Serializes and stores a value.
    ///
    /// Returns `Ok(false)` if the value is too large or a chunk could not be
    /// written.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Codec`] if `value` cannot be serialized, plus the
    /// pool errors of [`Client::set_raw`].
    pub fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        expire: Duration,
    ) -> CoreResult<bool> {
        let bytes = memchunk_codec::to_bytes(value)?;
        self.values.put(key, &bytes, expire)
    }

    /// Stores already-serialized bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoServersAvailable`] once every server has left the
    /// pool, or [`CoreError::Store`] for any other store failure.
    pub fn set_raw(&self, key: &str, bytes: &[u8], expire: Duration) -> CoreResult<bool> {
        self.values.put(key, bytes, expire)
    }

    /// Serializes and stores a value only if `key` already exists.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Codec`] if `value` cannot be serialized, plus the
    /// pool errors of [`Client::replace_raw`].
    pub fn replace<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        expire: Duration,
    ) -> CoreResult<bool> {
        let bytes = memchunk_codec::to_bytes(value)?;
        self.values.replace(key, &bytes, expire)
    }

    /// Stores already-serialized bytes only if `key` already exists.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoServersAvailable`] once every server has left the
    /// pool, or [`CoreError::Store`] for any other store failure.
    pub fn replace_raw(&self, key: &str, bytes: &[u8], expire: Duration) -> CoreResult<bool> {
        self.values.replace(key, bytes, expire)
    }

    /// Fetches and deserializes one value.
    ///
    /// A value that fails to deserialize is reported as absent.
    ///
    /// # Errors
    ///
    /// Same as [`Client::get_raw`]; deserialization failures are not errors.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> CoreResult<Option<T>> {
        Ok(self.get_many(&[key])?.remove(key).flatten())
    }

    /// Fetches one value's bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoServersAvailable`] once every server has left the
    /// pool, or [`CoreError::Store`] for any other store failure.
    pub fn get_raw(&self, key: &str) -> CoreResult<Option<Vec<u8>>> {
        Ok(self.reader.get_many(&[key])?.remove(key).flatten())
    }

    /// Fetches and deserializes many values in at most two round trips.
    ///
    /// The result has one entry per distinct key. Values that are absent,
    /// corrupt, or fail to deserialize map to `None`.
    ///
    /// # Errors
    ///
    /// Same as [`Client::get_many_raw`].
    pub fn get_many<T: DeserializeOwned, S: AsRef<str>>(
        &self,
        keys: &[S],
    ) -> CoreResult<HashMap<String, Option<T>>> {
        let raw = self.reader.get_many(keys)?;
        Ok(raw
            .into_iter()
            .map(|(key, bytes)| {
                let value = bytes.and_then(|b| self.decode(&key, &b));
                (key, value)
            })
            .collect())
    }

    /// Fetches many values' bytes in at most two round trips.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoServersAvailable`] once every server has left the
    /// pool, or [`CoreError::Store`] for any other store failure.
    pub fn get_many_raw<S: AsRef<str>>(
        &self,
        keys: &[S],
    ) -> CoreResult<HashMap<String, Option<Vec<u8>>>> {
        self.reader.get_many(keys)
    }

    /// Deletes `key`.
    ///
    /// Only chunk 0 is removed; orphaned chunks are unreachable and expire
    /// on their own. Returns `Ok(false)` without contacting the store if
    /// this client already knows the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoServersAvailable`] once every server has left the
    /// pool, or [`CoreError::Store`] for any other store failure.
    pub fn delete(&self, key: &str) -> CoreResult<bool> {
        self.values.delete(key)
    }

    /// Invalidates every entry in the pool.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoServersAvailable`] once every server has left the
    /// pool, or [`CoreError::Store`] for any other store failure.
    /// The absent-key cache is left intact on error.
    pub fn flush(&self) -> CoreResult<bool> {
        let flushed = self.pool.flush()?;
        self.absent.clear();
        Ok(flushed)
    }

    /// Returns the store's per-server statistics.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoServersAvailable`] once every server has left the
    /// pool, or [`CoreError::Store`] for any other store failure.
    pub fn server_stats(&self) -> CoreResult<ServerStats> {
        self.pool.server_stats()
    }

    fn decode<T: DeserializeOwned>(&self, key: &str, bytes: &[u8]) -> Option<T> {
        match memchunk_codec::from_bytes(bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "cached value failed to deserialize");
                self.stats.record_decode_failure();
                None
            }
        }
    }

    // === Locks ===

    /// Blocks until the lock on `key` is acquired.
    ///
    /// Polls the store with exponential backoff and never gives up. Locking
    /// a key this client already holds waits for the lock entry to expire.
    ///
    /// # Errors
    ///
    /// Returns an error only if the server pool becomes unusable.
    pub fn lock(&self, key: &str) -> CoreResult<()> {
        self.locks.lock(key)
    }

    /// Makes a single attempt to acquire the lock on `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoServersAvailable`] once every server has left the
    /// pool, or [`CoreError::Store`] for any other store failure.
    pub fn try_lock(&self, key: &str) -> CoreResult<bool> {
        self.locks.try_lock(key)
    }

    /// Releases the lock on `key`.
    ///
    /// The lock entry is deleted whether or not this client created it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoServersAvailable`] once every server has left the
    /// pool, or [`CoreError::Store`] for any other store failure.
    /// The key is dropped from this client's held set either way.
    pub fn unlock(&self, key: &str) -> CoreResult<bool> {
        self.locks.unlock(key)
    }

    /// Returns true if this client holds the lock on `key`.
    pub fn is_locked(&self, key: &str) -> bool {
        self.locks.is_held(key)
    }

    /// Returns the keys this client holds locks on, sorted.
    pub fn held_locks(&self) -> Vec<String> {
        self.locks.held()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        let released = self.locks.release_all();
        if released > 0 {
            info!(released, "released locks on close");
        }
    }
}
