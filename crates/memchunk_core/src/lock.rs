//! Spinlock-style distributed locks.
//!
//! A lock on logical key `k` is the store entry `lock_key(k)`. It is taken
//! with the store's atomic `add` (insert-if-absent) and released by deleting
//! it. Whoever's `add` succeeds holds the lock; everyone else sleeps with
//! exponential backoff and tries again, indefinitely.
//!
//! ```text
//! UNLOCKED --lock()--> ACQUIRING --add ok--> HELD --unlock()--> UNLOCKED
//!                        ^     |
//!                        +-----+ add refused: sleep(backoff(attempt))
//! ```
//!
//! Lock entries carry a server-side expiry, so a holder that dies without
//! cleaning up blocks others for at most that long. Within a process, a
//! panic hook installed on the first acquisition releases every lock still
//! held by any live client, but only for a panic that ends the process: one
//! on the main thread, or any panic under `panic = "abort"`. A worker thread
//! that unwinds leaves other holders alone; its own client releases its
//! locks on drop. A panic raised inside a store call releases nothing, since
//! the store may still be locked by the panicking thread.
//!
//! There is no ownership token: `unlock(k)` deletes the entry whoever
//! created it.

use crate::config::LockBackoff;
use crate::error::CoreResult;
use crate::failover::{in_store_call, Pool};
use crate::key::KeyEncoder;
use crate::stats::ClientStats;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once, Weak};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Value stored in a lock entry; only its existence matters.
const LOCK_VALUE: &[u8] = b"1";

/// How long the crash hook waits for a table's held set.
const CRASH_LOCK_WAIT: Duration = Duration::from_millis(100);

/// Lock tables of every live client in this process.
static LIVE_TABLES: Mutex<Vec<Weak<LockTable>>> = parking_lot::const_mutex(Vec::new());

static CRASH_HOOK: Once = Once::new();

/// Locks held by one client.
pub(crate) struct LockTable {
    pool: Arc<Pool>,
    encoder: Arc<dyn KeyEncoder>,
    stats: Arc<ClientStats>,
    expiry: Duration,
    backoff: LockBackoff,
    held: Mutex<HashSet<String>>,
    registered: AtomicBool,
}

impl LockTable {
    pub(crate) fn new(
        pool: Arc<Pool>,
        encoder: Arc<dyn KeyEncoder>,
        stats: Arc<ClientStats>,
        expiry: Duration,
        backoff: LockBackoff,
    ) -> Arc<Self> {
        Arc::new(Self {
            pool,
            encoder,
            stats,
            expiry,
            backoff,
            held: Mutex::new(HashSet::new()),
            registered: AtomicBool::new(false),
        })
    }

    /// Blocks until the lock on `key` is acquired.
    pub(crate) fn lock(self: &Arc<Self>, key: &str) -> CoreResult<()> {
        let lock_key = self.encoder.lock_key(key);
        let mut attempt = 0u32;
        while !self.pool.add(&lock_key, LOCK_VALUE, 0, self.expiry)? {
            thread::sleep(self.backoff.delay_for_attempt(attempt));
            attempt = attempt.saturating_add(1);
        }
        debug!(key, attempts = u64::from(attempt) + 1, "lock acquired");
        self.acquired(key, u64::from(attempt));
        Ok(())
    }

    /// Makes one attempt to acquire the lock on `key`.
    pub(crate) fn try_lock(self: &Arc<Self>, key: &str) -> CoreResult<bool> {
        let acquired = self
            .pool
            .add(&self.encoder.lock_key(key), LOCK_VALUE, 0, self.expiry)?;
        if acquired {
            self.acquired(key, 0);
        }
        Ok(acquired)
    }

    /// Deletes the lock entry for `key`, whoever holds it.
    pub(crate) fn unlock(&self, key: &str) -> CoreResult<bool> {
        self.held.lock().remove(key);
        self.pool.delete(&self.encoder.lock_key(key))
    }

    pub(crate) fn is_held(&self, key: &str) -> bool {
        self.held.lock().contains(key)
    }

    pub(crate) fn held(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.held.lock().iter().cloned().collect();
        keys.sort();
        keys
    }

    /// Releases every lock this table holds. Returns how many were released.
    pub(crate) fn release_all(&self) -> usize {
        let keys = std::mem::take(&mut *self.held.lock());
        self.release(keys)
    }

    fn release_on_crash(&self) -> usize {
        match self.held.try_lock_for(CRASH_LOCK_WAIT) {
            Some(mut held) => {
                let keys = std::mem::take(&mut *held);
                drop(held);
                self.release(keys)
            }
            None => 0,
        }
    }

    fn release(&self, keys: HashSet<String>) -> usize {
        let mut released = 0;
        for key in keys {
            match self.pool.delete(&self.encoder.lock_key(&key)) {
                Ok(_) => released += 1,
                Err(e) => warn!(key = %key, error = %e, "failed to release lock"),
            }
        }
        released
    }

    fn acquired(self: &Arc<Self>, key: &str, waits: u64) {
        self.held.lock().insert(key.to_string());
        self.stats.record_lock_acquired(waits);
        if !self.registered.swap(true, Ordering::AcqRel) {
            register(self);
        }
    }
}

/// Adds `table` to the crash-release set and installs the panic hook once
/// per process.
fn register(table: &Arc<LockTable>) {
    {
        let mut tables = LIVE_TABLES.lock();
        tables.retain(|t| t.strong_count() > 0);
        tables.push(Arc::downgrade(table));
    }

    CRASH_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            previous(info);
            if !ends_process(thread::current().name()) {
                return;
            }
            if in_store_call() {
                warn!("panic inside a store call, held locks left to expire");
                return;
            }
            release_live_tables();
        }));
    });
}

/// Returns true if a panic on the named thread terminates the process.
///
/// Under unwinding, a panic that leaves `main` ends the process; one on any
/// other thread can be caught by `join` or `catch_unwind`.
fn ends_process(thread_name: Option<&str>) -> bool {
    cfg!(panic = "abort") || thread_name == Some("main")
}

fn release_live_tables() {
    let tables: Vec<Arc<LockTable>> = match LIVE_TABLES.try_lock_for(CRASH_LOCK_WAIT) {
        Some(tables) => tables.iter().filter_map(Weak::upgrade).collect(),
        None => return,
    };
    for table in tables {
        let released = table.release_on_crash();
        if released > 0 {
            warn!(released, "released locks after panic");
        }
    }
}

/// Returns true once the crash hook has been installed in this process.
pub fn crash_hook_installed() -> bool {
    CRASH_HOOK.is_completed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::SelfHashingEncoder;
    use memchunk_store::{InMemoryStore, ServerAddr, StoreClient};
    use std::time::Instant;

    fn setup() -> (Arc<InMemoryStore>, Arc<LockTable>) {
        let servers = vec![ServerAddr::new("localhost", 11211)];
        let store = Arc::new(InMemoryStore::with_servers(&servers));
        let stats = Arc::new(ClientStats::new());
        let pool = Arc::new(Pool::new(store.clone(), servers, Arc::clone(&stats)));
        let table = LockTable::new(
            pool,
            Arc::new(SelfHashingEncoder),
            stats,
            Duration::from_secs(30),
            LockBackoff::default(),
        );
        (store, table)
    }

    #[test]
    fn lock_creates_entry_with_expiry() {
        let (store, table) = setup();
        table.lock("job").unwrap();

        assert!(store.contains("job_lock"));
        assert!(table.is_held("job"));
        assert!(crash_hook_installed());

        store.advance(Duration::from_secs(30));
        assert!(!store.contains("job_lock"));
    }

    #[test]
    fn try_lock_refuses_held_lock() {
        let (_, table) = setup();
        assert!(table.try_lock("job").unwrap());
        assert!(!table.try_lock("job").unwrap());
    }

    #[test]
    fn unlock_is_unconditional() {
        let (store, table) = setup();
        store
            .add("job_lock", b"someone else", 0, Duration::ZERO)
            .unwrap();

        assert!(table.unlock("job").unwrap());
        assert!(!store.contains("job_lock"));
        assert!(!table.unlock("job").unwrap());
    }

    #[test]
    fn lock_waits_for_release() {
        let (store, table) = setup();
        store.add("job_lock", b"1", 0, Duration::ZERO).unwrap();

        let releaser = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                store.delete("job_lock").unwrap();
            })
        };

        let start = Instant::now();
        table.lock("job").unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
        releaser.join().unwrap();
    }

    #[test]
    fn only_main_thread_panics_end_the_process() {
        assert!(ends_process(Some("main")));
        assert_eq!(ends_process(Some("worker")), cfg!(panic = "abort"));
        assert_eq!(ends_process(None), cfg!(panic = "abort"));
    }

    #[test]
    fn worker_panic_keeps_locks() {
        let (store, table) = setup();
        table.lock("job").unwrap();

        let crashed = thread::spawn(|| panic!("worker failed")).join();
        assert!(crashed.is_err());
        assert!(table.is_held("job"));
        assert!(store.contains("job_lock"));
    }

    #[test]
    fn release_all_drops_every_lock() {
        let (store, table) = setup();
        table.lock("a").unwrap();
        table.lock("b").unwrap();
        assert_eq!(table.held(), vec!["a", "b"]);

        assert_eq!(table.release_all(), 2);
        assert!(table.held().is_empty());
        assert!(!store.contains("a_lock"));
        assert!(!store.contains("b_lock"));
    }
}
