//! In-memory store client for testing.

use crate::client::{Entry, ServerStats, StoreClient};
use crate::error::{StoreError, StoreResult};
use crate::server::ServerAddr;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// A simulated memcache server pool held in memory.
///
/// All servers share one keyspace. The pool can be told that a server is
/// down, after which every request fails with
/// [`StoreError::ServerUnreachable`] until that server is removed.
///
/// This client is suitable for:
/// - Unit and integration tests
/// - Counting round trips and writes
/// - Injecting write failures and server loss
///
/// # Thread Safety
///
/// Thread-safe; wrap it in an `Arc` to share it between several memchunk
/// clients, which then behave like independent processes on one pool.
///
/// # Example
///
/// ```rust
/// use memchunk_store::{InMemoryStore, ServerAddr, StoreClient};
/// use std::time::Duration;
///
/// let store = InMemoryStore::new();
/// store.add_server(&ServerAddr::new("localhost", 11211), false).unwrap();
/// assert!(store.add("k", b"v", 0, Duration::ZERO).unwrap());
/// assert!(!store.add("k", b"v", 0, Duration::ZERO).unwrap());
/// assert_eq!(store.round_trips(), 2);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<PoolState>,
    round_trips: AtomicU64,
    writes: AtomicU64,
}

#[derive(Debug, Default)]
struct PoolState {
    entries: HashMap<String, StoredEntry>,
    servers: Vec<ServerAddr>,
    down: HashSet<(String, u16)>,
    prefix: String,
    /// Remaining successful writes before writes start failing.
    write_budget: Option<u64>,
    /// Added to `Instant::now()` to simulate the passage of time.
    clock_skew: Duration,
    hits: u64,
    misses: u64,
}

#[derive(Debug, Clone)]
struct StoredEntry {
    value: Vec<u8>,
    flags: u32,
    expires_at: Option<Instant>,
}

impl PoolState {
    fn now(&self) -> Instant {
        Instant::now() + self.clock_skew
    }

    fn check_pool(&self) -> StoreResult<()> {
        if self.servers.is_empty() {
            return Err(StoreError::NoServers);
        }
        if let Some(server) = self
            .servers
            .iter()
            .find(|s| self.down.contains(&(s.host.clone(), s.port)))
        {
            return Err(StoreError::unreachable(server.host.clone(), server.port));
        }
        Ok(())
    }

    fn internal_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn live(&mut self, key: &str) -> Option<&StoredEntry> {
        let internal = self.internal_key(key);
        let now = self.now();
        let expired = self
            .entries
            .get(&internal)
            .is_some_and(|e| e.expires_at.is_some_and(|at| at <= now));
        if expired {
            self.entries.remove(&internal);
        }
        self.entries.get(&internal)
    }

    fn take_write_budget(&mut self) -> bool {
        match self.write_budget.as_mut() {
            None => true,
            Some(0) => false,
            Some(n) => {
                *n -= 1;
                true
            }
        }
    }

    fn store(&mut self, key: &str, value: &[u8], flags: u32, expire: Duration) {
        let expires_at = if expire.is_zero() {
            None
        } else {
            Some(self.now() + expire)
        };
        let internal = self.internal_key(key);
        self.entries.insert(
            internal,
            StoredEntry {
                value: value.to_vec(),
                flags,
                expires_at,
            },
        );
    }
}

/// Which existence precondition a write carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Set,
    Add,
    Replace,
}

impl InMemoryStore {
    /// Creates an empty store with no servers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with the given servers already in the pool.
    #[must_use]
    pub fn with_servers(servers: &[ServerAddr]) -> Self {
        let store = Self::new();
        store.state.write().servers = servers.to_vec();
        store
    }

    /// Marks `host:port` as down.
    ///
    /// A down server refuses `add_server`, and while it is in the pool every
    /// request fails with [`StoreError::ServerUnreachable`].
    pub fn mark_down(&self, host: &str, port: u16) {
        self.state.write().down.insert((host.to_string(), port));
    }

    /// Marks `host:port` as reachable again.
    pub fn mark_up(&self, host: &str, port: u16) {
        self.state.write().down.remove(&(host.to_string(), port));
    }

    /// Lets the next `count` writes succeed, then fails every later write
    /// with `Ok(false)`. `None` removes the limit.
    pub fn fail_writes_after(&self, count: Option<u64>) {
        self.state.write().write_budget = count;
    }

    /// Moves the store's clock forward, expiring entries whose time is up.
    pub fn advance(&self, by: Duration) {
        self.state.write().clock_skew += by;
    }

    /// Returns the servers currently in the pool.
    #[must_use]
    pub fn servers(&self) -> Vec<ServerAddr> {
        self.state.read().servers.clone()
    }

    /// Returns true if a live entry exists for `key`.
    ///
    /// Does not count as a round trip.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.state.write().live(key).is_some()
    }

    /// Returns the live keys as the backend stores them, prefix included.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let state = self.state.read();
        let now = state.now();
        let mut keys: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, e)| e.expires_at.map_or(true, |at| at > now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Returns the number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys().len()
    }

    /// Returns true if the store holds no live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of requests served since the last reset.
    #[must_use]
    pub fn round_trips(&self) -> u64 {
        self.round_trips.load(Ordering::Relaxed)
    }

    /// Returns the number of successful writes since the last reset.
    #[must_use]
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Resets the round-trip and write counters.
    pub fn reset_counters(&self) {
        self.round_trips.store(0, Ordering::Relaxed);
        self.writes.store(0, Ordering::Relaxed);
    }

    fn begin(&self) {
        self.round_trips.fetch_add(1, Ordering::Relaxed);
    }

    fn write(
        &self,
        mode: WriteMode,
        key: &str,
        value: &[u8],
        flags: u32,
        expire: Duration,
    ) -> StoreResult<bool> {
        self.begin();
        let mut state = self.state.write();
        state.check_pool()?;

        let exists = state.live(key).is_some();
        let allowed = match mode {
            WriteMode::Set => true,
            WriteMode::Add => !exists,
            WriteMode::Replace => exists,
        };
        if !allowed || !state.take_write_budget() {
            return Ok(false);
        }

        state.store(key, value, flags, expire);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }
}

impl StoreClient for InMemoryStore {
    fn add_server(&self, server: &ServerAddr, _persistent: bool) -> StoreResult<bool> {
        let mut state = self.state.write();
        if state.down.contains(&(server.host.clone(), server.port)) {
            return Ok(false);
        }
        if !state
            .servers
            .iter()
            .any(|s| s.matches(&server.host, server.port))
        {
            state.servers.push(server.clone());
        }
        Ok(true)
    }

    fn remove_server(&self, host: &str, port: u16) -> bool {
        let mut state = self.state.write();
        let before = state.servers.len();
        state.servers.retain(|s| !s.matches(host, port));
        state.servers.len() != before
    }

    fn configure_prefix(&self, prefix: &str) {
        self.state.write().prefix = prefix.to_string();
    }

    fn get(&self, key: &str) -> StoreResult<Option<Entry>> {
        self.begin();
        let mut state = self.state.write();
        state.check_pool()?;

        let found = state.live(key).map(|e| Entry::new(e.value.clone(), e.flags));
        if found.is_some() {
            state.hits += 1;
        } else {
            state.misses += 1;
        }
        Ok(found)
    }

    fn get_multi(&self, keys: &[String]) -> StoreResult<HashMap<String, Entry>> {
        self.begin();
        let mut state = self.state.write();
        state.check_pool()?;

        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            match state.live(key).map(|e| Entry::new(e.value.clone(), e.flags)) {
                Some(entry) => {
                    state.hits += 1;
                    found.insert(key.clone(), entry);
                }
                None => state.misses += 1,
            }
        }
        Ok(found)
    }

    fn set(&self, key: &str, value: &[u8], flags: u32, expire: Duration) -> StoreResult<bool> {
        self.write(WriteMode::Set, key, value, flags, expire)
    }

    fn add(&self, key: &str, value: &[u8], flags: u32, expire: Duration) -> StoreResult<bool> {
        self.write(WriteMode::Add, key, value, flags, expire)
    }

    fn replace(
        &self,
        key: &str,
        value: &[u8],
        flags: u32,
        expire: Duration,
    ) -> StoreResult<bool> {
        self.write(WriteMode::Replace, key, value, flags, expire)
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        self.begin();
        let mut state = self.state.write();
        state.check_pool()?;

        if state.live(key).is_none() {
            return Ok(false);
        }
        let internal = state.internal_key(key);
        Ok(state.entries.remove(&internal).is_some())
    }

    fn flush(&self) -> StoreResult<bool> {
        self.begin();
        let mut state = self.state.write();
        state.check_pool()?;
        state.entries.clear();
        Ok(true)
    }

    fn stats(&self) -> StoreResult<ServerStats> {
        self.begin();
        let state = self.state.read();
        state.check_pool()?;

        let items = state.entries.len();
        let bytes: usize = state.entries.values().map(|e| e.value.len()).sum();
        let mut stats = BTreeMap::new();
        for server in &state.servers {
            let mut map = BTreeMap::new();
            map.insert("curr_items".to_string(), items.to_string());
            map.insert("bytes".to_string(), bytes.to_string());
            map.insert("get_hits".to_string(), state.hits.to_string());
            map.insert("get_misses".to_string(), state.misses.to_string());
            map.insert("weight".to_string(), server.weight.to_string());
            stats.insert(server.to_string(), map);
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pool() -> InMemoryStore {
        InMemoryStore::with_servers(&[ServerAddr::new("localhost", 11211)])
    }

    #[test]
    fn memory_new_has_no_servers() {
        let store = InMemoryStore::new();
        assert!(store.servers().is_empty());
        assert_eq!(store.get("k"), Err(StoreError::NoServers));
    }

    #[test]
    fn memory_set_then_get() {
        let store = pool();
        assert!(store.set("k", b"value", 7 << 16, Duration::ZERO).unwrap());

        let entry = store.get("k").unwrap().unwrap();
        assert_eq!(entry.value, b"value");
        assert_eq!(entry.flags, 7 << 16);
    }

    #[test]
    fn memory_add_is_insert_if_absent() {
        let store = pool();
        assert!(store.add("lock", b"1", 0, Duration::ZERO).unwrap());
        assert!(!store.add("lock", b"2", 0, Duration::ZERO).unwrap());
        assert_eq!(store.get("lock").unwrap().unwrap().value, b"1");
    }

    #[test]
    fn memory_replace_requires_existing() {
        let store = pool();
        assert!(!store.replace("k", b"v", 0, Duration::ZERO).unwrap());
        store.set("k", b"old", 0, Duration::ZERO).unwrap();
        assert!(store.replace("k", b"new", 0, Duration::ZERO).unwrap());
        assert_eq!(store.get("k").unwrap().unwrap().value, b"new");
    }

    #[test]
    fn memory_get_multi_is_one_round_trip() {
        let store = pool();
        store.set("a", b"1", 0, Duration::ZERO).unwrap();
        store.set("b", b"2", 0, Duration::ZERO).unwrap();
        store.reset_counters();

        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let found = store.get_multi(&keys).unwrap();
        assert_eq!(found.len(), 2);
        assert!(!found.contains_key("c"));
        assert_eq!(store.round_trips(), 1);
    }

    #[test]
    fn memory_delete_reports_existence() {
        let store = pool();
        store.set("k", b"v", 0, Duration::ZERO).unwrap();
        assert!(store.delete("k").unwrap());
        assert!(!store.delete("k").unwrap());
    }

    #[test]
    fn memory_entries_expire() {
        let store = pool();
        store.set("k", b"v", 0, Duration::from_secs(30)).unwrap();
        store.advance(Duration::from_secs(29));
        assert!(store.contains("k"));
        store.advance(Duration::from_secs(1));
        assert!(!store.contains("k"));
        assert!(store.add("k", b"again", 0, Duration::ZERO).unwrap());
    }

    #[test]
    fn memory_write_budget() {
        let store = pool();
        store.fail_writes_after(Some(1));
        assert!(store.set("a", b"1", 0, Duration::ZERO).unwrap());
        assert!(!store.set("b", b"2", 0, Duration::ZERO).unwrap());
        assert!(!store.contains("b"));

        store.fail_writes_after(None);
        assert!(store.set("b", b"2", 0, Duration::ZERO).unwrap());
        assert_eq!(store.writes(), 2);
    }

    #[test]
    fn memory_down_server_fails_requests() {
        let store = InMemoryStore::new();
        store.add_server(&ServerAddr::new("a", 1), false).unwrap();
        store.add_server(&ServerAddr::new("b", 2), false).unwrap();

        store.mark_down("a", 1);
        assert_eq!(store.get("k"), Err(StoreError::unreachable("a", 1)));

        assert!(store.remove_server("a", 1));
        assert!(!store.remove_server("a", 1));
        assert_eq!(store.get("k"), Ok(None));
    }

    #[test]
    fn memory_add_server_refuses_down_host() {
        let store = InMemoryStore::new();
        store.mark_down("a", 1);
        assert!(!store.add_server(&ServerAddr::new("a", 1), false).unwrap());
        assert!(store.servers().is_empty());

        store.mark_up("a", 1);
        assert!(store.add_server(&ServerAddr::new("a", 1), false).unwrap());
        assert!(store.add_server(&ServerAddr::new("a", 1), false).unwrap());
        assert_eq!(store.servers().len(), 1);
    }

    #[test]
    fn memory_prefix_is_applied_internally() {
        let store = pool();
        store.configure_prefix("app:");
        store.set("k", b"v", 0, Duration::ZERO).unwrap();
        assert_eq!(store.keys(), vec!["app:k".to_string()]);
        assert!(store.get("k").unwrap().is_some());
    }

    #[test]
    fn memory_flush_and_stats() {
        let store = pool();
        store.set("a", b"12345", 0, Duration::ZERO).unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats["localhost:11211"]["curr_items"], "1");
        assert_eq!(stats["localhost:11211"]["bytes"], "5");

        assert!(store.flush().unwrap());
        assert!(store.is_empty());
    }

    proptest! {
        #[test]
        fn memory_get_multi_returns_exactly_live_keys(
            stored in prop::collection::btree_set("[a-z]{1,6}", 0..20),
            asked in prop::collection::vec("[a-z]{1,6}", 0..20),
        ) {
            let store = pool();
            for key in &stored {
                store.set(key, key.as_bytes(), 0, Duration::ZERO).unwrap();
            }

            let found = store.get_multi(&asked).unwrap();
            for key in &asked {
                prop_assert_eq!(found.contains_key(key), stored.contains(key));
            }
            for (key, entry) in &found {
                prop_assert_eq!(entry.value.as_slice(), key.as_bytes());
            }
            prop_assert_eq!(store.round_trips(), stored.len() as u64 + 1);
        }
    }
}
