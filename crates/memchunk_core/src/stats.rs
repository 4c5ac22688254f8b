//! Client statistics.
//!
//! # Usage
//!
//! ```rust,ignore
//! let client = Client::open(config, store)?;
//! client.get::<String>("greeting")?;
//!
//! let stats = client.stats();
//! println!("hits: {}, misses: {}", stats.hits(), stats.misses());
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing what a client has done.
///
/// All counters are atomic and monotonically increasing.
#[derive(Debug, Default)]
pub struct ClientStats {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    chunked_writes: AtomicU64,
    chunked_reads: AtomicU64,
    failed_writes: AtomicU64,
    capacity_rejections: AtomicU64,
    corrupt_entries: AtomicU64,
    decode_failures: AtomicU64,
    skipped_deletes: AtomicU64,
    locks_acquired: AtomicU64,
    lock_waits: AtomicU64,
    servers_lost: AtomicU64,
}

impl ClientStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self, chunks: usize) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        if chunks > 1 {
            self.chunked_writes.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_chunked_read(&self) {
        self.chunked_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed_write(&self) {
        self.failed_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_capacity_rejection(&self) {
        self.capacity_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_corrupt_entry(&self) {
        self.corrupt_entries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped_delete(&self) {
        self.skipped_deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_lock_acquired(&self, waits: u64) {
        self.locks_acquired.fetch_add(1, Ordering::Relaxed);
        self.lock_waits.fetch_add(waits, Ordering::Relaxed);
    }

    pub(crate) fn record_server_lost(&self) {
        self.servers_lost.fetch_add(1, Ordering::Relaxed);
    }

    /// Keys found by a read.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Keys absent from a read, including corrupt and undecodable ones.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Successful set or replace operations.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Successful writes that needed more than one chunk.
    pub fn chunked_writes(&self) -> u64 {
        self.chunked_writes.load(Ordering::Relaxed)
    }

    /// Values reassembled from more than one chunk.
    pub fn chunked_reads(&self) -> u64 {
        self.chunked_reads.load(Ordering::Relaxed)
    }

    /// Writes abandoned because a chunk could not be stored.
    pub fn failed_writes(&self) -> u64 {
        self.failed_writes.load(Ordering::Relaxed)
    }

    /// Writes refused because the value was too large.
    pub fn capacity_rejections(&self) -> u64 {
        self.capacity_rejections.load(Ordering::Relaxed)
    }

    /// Chunked entries found with a missing chunk and deleted.
    pub fn corrupt_entries(&self) -> u64 {
        self.corrupt_entries.load(Ordering::Relaxed)
    }

    /// Reassembled values that failed to deserialize.
    pub fn decode_failures(&self) -> u64 {
        self.decode_failures.load(Ordering::Relaxed)
    }

    /// Deletes answered from the nonexistence cache without a round trip.
    pub fn skipped_deletes(&self) -> u64 {
        self.skipped_deletes.load(Ordering::Relaxed)
    }

    /// Locks acquired.
    pub fn locks_acquired(&self) -> u64 {
        self.locks_acquired.load(Ordering::Relaxed)
    }

    /// Failed lock attempts that were followed by a backoff sleep.
    pub fn lock_waits(&self) -> u64 {
        self.lock_waits.load(Ordering::Relaxed)
    }

    /// Servers removed from the active pool.
    pub fn servers_lost(&self) -> u64 {
        self.servers_lost.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_new_is_zero() {
        let stats = ClientStats::new();
        assert_eq!(stats.hits(), 0);
        assert_eq!(stats.writes(), 0);
        assert_eq!(stats.locks_acquired(), 0);
    }

    #[test]
    fn chunked_writes_are_counted_separately() {
        let stats = ClientStats::new();
        stats.record_write(1);
        stats.record_write(3);
        assert_eq!(stats.writes(), 2);
        assert_eq!(stats.chunked_writes(), 1);
    }

    #[test]
    fn lock_waits_accumulate() {
        let stats = ClientStats::new();
        stats.record_lock_acquired(0);
        stats.record_lock_acquired(4);
        assert_eq!(stats.locks_acquired(), 2);
        assert_eq!(stats.lock_waits(), 4);
    }
}
