//! Lock release when the process panics.
//!
//! The panic hook only releases locks for a panic on the main thread, and the
//! libtest harness runs every test on a worker thread. This binary therefore
//! runs without the harness and drives each case from `main`. Each case drops
//! its clients before the next one starts.

use memchunk_core::{
    crash_hook_installed, BackendKind, Client, Config, Entry, InMemoryStore, ServerAddr,
    ServerStats, StoreClient, StoreResult,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn config() -> Config {
    Config::new()
        .server("localhost", 11211)
        .backend(BackendKind::SelfHashing)
}

/// A store that serializes every call behind one lock and panics while
/// holding it when asked for the key `"explode"`.
struct ExplodingStore {
    inner: InMemoryStore,
    gate: Mutex<()>,
}

impl ExplodingStore {
    fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
            gate: Mutex::new(()),
        }
    }
}

impl StoreClient for ExplodingStore {
    fn add_server(&self, server: &ServerAddr, persistent: bool) -> StoreResult<bool> {
        let _gate = self.gate.lock();
        self.inner.add_server(server, persistent)
    }

    fn remove_server(&self, host: &str, port: u16) -> bool {
        let _gate = self.gate.lock();
        self.inner.remove_server(host, port)
    }

    fn get(&self, key: &str) -> StoreResult<Option<Entry>> {
        let _gate = self.gate.lock();
        if key == "explode" {
            panic!("store failed mid-request");
        }
        self.inner.get(key)
    }

    fn get_multi(&self, keys: &[String]) -> StoreResult<HashMap<String, Entry>> {
        let _gate = self.gate.lock();
        if keys.iter().any(|k| k == "explode") {
            panic!("store failed mid-request");
        }
        self.inner.get_multi(keys)
    }

    fn set(&self, key: &str, value: &[u8], flags: u32, expire: Duration) -> StoreResult<bool> {
        let _gate = self.gate.lock();
        self.inner.set(key, value, flags, expire)
    }

    fn add(&self, key: &str, value: &[u8], flags: u32, expire: Duration) -> StoreResult<bool> {
        let _gate = self.gate.lock();
        self.inner.add(key, value, flags, expire)
    }

    fn replace(&self, key: &str, value: &[u8], flags: u32, expire: Duration) -> StoreResult<bool> {
        let _gate = self.gate.lock();
        self.inner.replace(key, value, flags, expire)
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        let _gate = self.gate.lock();
        self.inner.delete(key)
    }

    fn flush(&self) -> StoreResult<bool> {
        let _gate = self.gate.lock();
        self.inner.flush()
    }

    fn stats(&self) -> StoreResult<ServerStats> {
        let _gate = self.gate.lock();
        self.inner.stats()
    }
}

/// A worker thread that panics and is joined must not release locks other
/// clients are still using.
fn caught_worker_panic_keeps_other_locks() {
    let store = Arc::new(InMemoryStore::new());
    let holder = Client::open(config(), store.clone()).unwrap();
    let rival = Client::open(config(), store.clone()).unwrap();

    holder.lock("report").unwrap();
    assert!(crash_hook_installed());

    let worker = {
        let store = store.clone();
        thread::spawn(move || {
            let client = Client::open(config(), store).unwrap();
            client.lock("job").unwrap();
            panic!("worker crashed while holding a lock");
        })
    };
    assert!(worker.join().is_err());

    assert!(holder.is_locked("report"));
    assert!(store.contains("report_lock"));
    assert!(!rival.try_lock("report").unwrap());
    // the worker's own client released its lock while unwinding
    assert!(!store.contains("job_lock"));

    holder.unlock("report").unwrap();
}

/// A panic inside a store call must not call back into the store, which the
/// panicking thread may still have locked.
fn panic_inside_store_call_does_not_hang() {
    let store = Arc::new(ExplodingStore::new());
    let holder = Client::open(config(), store.clone()).unwrap();
    holder.lock("report").unwrap();

    let crashed = panic::catch_unwind(panic::AssertUnwindSafe(|| holder.get_raw("explode")));
    assert!(crashed.is_err());

    // locks are left to their server-side expiry
    assert!(holder.is_locked("report"));
    assert!(store.inner.contains("report_lock"));

    holder.unlock("report").unwrap();
}

/// A panic on the main thread releases every lock held by every live client.
fn main_thread_panic_releases_every_lock() {
    let store = Arc::new(InMemoryStore::new());
    let first = Client::open(config(), store.clone()).unwrap();
    let second = Client::open(config(), store.clone()).unwrap();
    first.lock("report").unwrap();
    second.lock("job").unwrap();

    let crashed = panic::catch_unwind(|| panic!("main thread crashed"));
    assert!(crashed.is_err());

    assert!(!store.contains("report_lock"));
    assert!(!store.contains("job_lock"));
    assert!(first.held_locks().is_empty());
    assert!(second.held_locks().is_empty());
}

fn main() {
    let cases: [(&str, fn()); 3] = [
        (
            "caught_worker_panic_keeps_other_locks",
            caught_worker_panic_keeps_other_locks,
        ),
        (
            "panic_inside_store_call_does_not_hang",
            panic_inside_store_call_does_not_hang,
        ),
        (
            "main_thread_panic_releases_every_lock",
            main_thread_panic_releases_every_lock,
        ),
    ];

    for (name, case) in cases {
        case();
        println!("test {name} ... ok");
    }
}
