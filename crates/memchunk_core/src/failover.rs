//! Server pool failover.
//!
//! [`FailoverTracker`] keeps the set of servers still considered active.
//! [`Pool`] wraps the store client so every request goes through it: when
//! the client reports a server unreachable, that server is dropped from both
//! the tracker and the client, and the request is retried on what remains.
//! Once nothing remains every request fails with
//! [`CoreError::NoServersAvailable`].

use crate::error::{CoreError, CoreResult};
use crate::stats::ClientStats;
use memchunk_store::{Entry, ServerAddr, ServerStats, StoreClient, StoreError, StoreResult};
use parking_lot::RwLock;
use std::cell::Cell;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

thread_local! {
    /// Set while this thread is inside a store client call.
    static IN_STORE_CALL: Cell<bool> = const { Cell::new(false) };
}

/// Returns true if the current thread is inside a store client call.
///
/// A panic raised there may leave the store's own locks held by this
/// thread, so nothing may call back into the store from the panic hook.
pub(crate) fn in_store_call() -> bool {
    IN_STORE_CALL.with(Cell::get)
}

/// Marks the current thread as inside a store call until dropped.
struct StoreCallGuard {
    outer: bool,
}

impl StoreCallGuard {
    fn enter() -> Self {
        Self {
            outer: IN_STORE_CALL.with(|flag| flag.replace(true)),
        }
    }
}

impl Drop for StoreCallGuard {
    fn drop(&mut self) {
        IN_STORE_CALL.with(|flag| flag.set(self.outer));
    }
}

/// Tracks which servers are still in the active pool.
#[derive(Debug, Default)]
pub struct FailoverTracker {
    active: RwLock<Vec<ServerAddr>>,
}

impl FailoverTracker {
    /// Creates a tracker with the given active servers.
    pub fn new(active: Vec<ServerAddr>) -> Self {
        Self {
            active: RwLock::new(active),
        }
    }

    /// Removes `host:port` from the active set.
    ///
    /// Returns `false` if it was not active.
    pub fn on_server_unreachable(&self, host: &str, port: u16) -> bool {
        let mut active = self.active.write();
        let before = active.len();
        active.retain(|s| !s.matches(host, port));
        active.len() != before
    }

    /// Returns the servers still active.
    pub fn active_servers(&self) -> Vec<ServerAddr> {
        self.active.read().clone()
    }

    /// Returns true once every server has been removed.
    pub fn is_exhausted(&self) -> bool {
        self.active.read().is_empty()
    }

    /// Fails if no server remains.
    pub fn ensure_available(&self) -> CoreResult<()> {
        if self.is_exhausted() {
            return Err(CoreError::NoServersAvailable);
        }
        Ok(())
    }
}

/// The store client behind failover handling.
pub(crate) struct Pool {
    store: Arc<dyn StoreClient>,
    tracker: FailoverTracker,
    stats: Arc<ClientStats>,
}

impl Pool {
    pub(crate) fn new(
        store: Arc<dyn StoreClient>,
        active: Vec<ServerAddr>,
        stats: Arc<ClientStats>,
    ) -> Self {
        Self {
            store,
            tracker: FailoverTracker::new(active),
            stats,
        }
    }

    pub(crate) fn tracker(&self) -> &FailoverTracker {
        &self.tracker
    }

    /// Runs `op` against the store, failing servers over until it succeeds
    /// or the pool is empty.
    fn call<T>(&self, op: impl Fn(&dyn StoreClient) -> StoreResult<T>) -> CoreResult<T> {
        loop {
            self.tracker.ensure_available()?;
            let result = {
                let _guard = StoreCallGuard::enter();
                op(self.store.as_ref())
            };
            match result {
                Ok(value) => return Ok(value),
                Err(StoreError::ServerUnreachable { host, port }) => {
                    if !self.tracker.on_server_unreachable(&host, port) {
                        return Err(StoreError::ServerUnreachable { host, port }.into());
                    }
                    self.store.remove_server(&host, port);
                    self.stats.record_server_lost();
                    warn!(%host, port, "server unreachable, removed from pool");
                    if self.tracker.is_exhausted() {
                        error!("all servers lost");
                        return Err(CoreError::NoServersAvailable);
                    }
                }
                Err(StoreError::NoServers) => return Err(CoreError::NoServersAvailable),
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub(crate) fn get(&self, key: &str) -> CoreResult<Option<Entry>> {
        self.call(|s| s.get(key))
    }

    pub(crate) fn get_multi(&self, keys: &[String]) -> CoreResult<HashMap<String, Entry>> {
        self.call(|s| s.get_multi(keys))
    }

    pub(crate) fn set(&self, key: &str, value: &[u8], flags: u32, expire: Duration) -> CoreResult<bool> {
        self.call(|s| s.set(key, value, flags, expire))
    }

    pub(crate) fn add(&self, key: &str, value: &[u8], flags: u32, expire: Duration) -> CoreResult<bool> {
        self.call(|s| s.add(key, value, flags, expire))
    }

    pub(crate) fn replace(
        &self,
        key: &str,
        value: &[u8],
        flags: u32,
        expire: Duration,
    ) -> CoreResult<bool> {
        self.call(|s| s.replace(key, value, flags, expire))
    }

    pub(crate) fn delete(&self, key: &str) -> CoreResult<bool> {
        self.call(|s| s.delete(key))
    }

    pub(crate) fn flush(&self) -> CoreResult<bool> {
        self.call(|s| s.flush())
    }

    pub(crate) fn server_stats(&self) -> CoreResult<ServerStats> {
        self.call(|s| s.stats())
    }
}
