//! Chunked value writes.
//!
//! A serialized value larger than the chunk limit is split across several
//! physical keys:
//!
//! ```text
//! key        -> bytes[0 .. max)        flags: parts = n - 1
//! key_s1     -> bytes[max .. 2*max)    flags: parts = 0
//! ...
//! key_s{n-1} -> bytes[(n-1)*max ..)    flags: parts = 0
//! ```
//!
//! Chunk 0 is written first and is the only chunk that carries the part
//! count, so a reader always learns how many chunks to expect from chunk 0.
//! Writes are sequential; if one fails, chunk 0 is deleted so the entry is
//! unreachable rather than truncated. Chunk tails left behind by a failed
//! write or a delete are unreachable and expire on their own.

use crate::config::Config;
use crate::error::CoreResult;
use crate::failover::Pool;
use crate::key::KeyEncoder;
use crate::stats::ClientStats;
use memchunk_codec::{Flags, MAX_PART_COUNT};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Logical keys this process has seen to be absent.
///
/// Only used to skip deletes that would find nothing. It is not
/// authoritative: another process may have written the key since.
#[derive(Debug, Default)]
pub(crate) struct NonexistenceCache {
    keys: RwLock<HashSet<String>>,
}

impl NonexistenceCache {
    pub(crate) fn insert(&self, key: &str) {
        self.keys.write().insert(key.to_string());
    }

    pub(crate) fn remove(&self, key: &str) {
        self.keys.write().remove(key);
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.keys.read().contains(key)
    }

    pub(crate) fn clear(&self) {
        self.keys.write().clear();
    }
}

/// Which store primitive writes chunk 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Set,
    Replace,
}

/// Writes and deletes possibly-oversized values.
pub(crate) struct ChunkedStore {
    pool: Arc<Pool>,
    encoder: Arc<dyn KeyEncoder>,
    absent: Arc<NonexistenceCache>,
    stats: Arc<ClientStats>,
    config: Config,
    /// `config.max_chunk_size`, at least 1.
    max_chunk_size: usize,
}

impl ChunkedStore {
    pub(crate) fn new(
        config: &Config,
        pool: Arc<Pool>,
        encoder: Arc<dyn KeyEncoder>,
        absent: Arc<NonexistenceCache>,
        stats: Arc<ClientStats>,
    ) -> Self {
        Self {
            pool,
            encoder,
            absent,
            stats,
            config: config.clone(),
            max_chunk_size: config.max_chunk_size.max(1),
        }
    }

    /// Stores `bytes` under `key`, chunking if necessary.
    pub(crate) fn put(&self, key: &str, bytes: &[u8], expire: Duration) -> CoreResult<bool> {
        self.write(WriteMode::Set, key, bytes, expire)
    }

    /// Stores `bytes` under `key` only if `key` already exists.
    pub(crate) fn replace(&self, key: &str, bytes: &[u8], expire: Duration) -> CoreResult<bool> {
        self.write(WriteMode::Replace, key, bytes, expire)
    }

    /// Deletes chunk 0 of `key`.
    ///
    /// Returns `false` without a round trip if `key` is known to be absent.
    pub(crate) fn delete(&self, key: &str) -> CoreResult<bool> {
        if self.absent.contains(key) {
            self.stats.record_skipped_delete();
            return Ok(false);
        }
        let deleted = self.pool.delete(&self.encoder.encode(key))?;
        self.absent.insert(key);
        Ok(deleted)
    }

    /// Number of chunks needed for `len` bytes; an empty value is one chunk.
    fn chunk_count(&self, len: usize) -> usize {
        len.div_ceil(self.max_chunk_size).max(1)
    }

    fn write(&self, mode: WriteMode, key: &str, bytes: &[u8], expire: Duration) -> CoreResult<bool> {
        let chunks = self.chunk_count(bytes.len());
        let part_count = u32::try_from(chunks - 1).unwrap_or(u32::MAX);

        if chunks > 1 && (!self.config.large_items || part_count > MAX_PART_COUNT) {
            warn!(
                key,
                len = bytes.len(),
                max = self.max_chunk_size,
                "value too large, not stored"
            );
            self.stats.record_capacity_rejection();
            return Ok(false);
        }

        let compressed = self.config.should_compress(bytes.len());
        let head_key = self.encoder.encode(key);

        if chunks == 1 {
            let flags = Flags::chunked(compressed, 0).encode()?;
            let stored = match mode {
                WriteMode::Set => self.pool.set(&head_key, bytes, flags, expire)?,
                WriteMode::Replace => self.pool.replace(&head_key, bytes, flags, expire)?,
            };
            if stored {
                self.absent.remove(key);
                self.stats.record_write(1);
            }
            return Ok(stored);
        }

        if mode == WriteMode::Replace && self.pool.get(&head_key)?.is_none() {
            debug!(key, "replace of chunked value skipped, key absent");
            return Ok(false);
        }

        let head_flags = Flags::chunked(compressed, part_count).encode()?;
        let tail_flags = Flags::chunked(compressed, 0).encode()?;

        for (index, chunk) in bytes.chunks(self.max_chunk_size).enumerate() {
            let (chunk_key, flags) = if index == 0 {
                (head_key.clone(), head_flags)
            } else {
                let index = u32::try_from(index).unwrap_or(u32::MAX);
                (self.encoder.chunk_key(key, index), tail_flags)
            };

            if !self.pool.set(&chunk_key, chunk, flags, expire)? {
                warn!(key, chunk = index, chunks, "chunk write failed, dropping entry");
                self.pool.delete(&head_key)?;
                self.stats.record_failed_write();
                return Ok(false);
            }
        }

        debug!(key, len = bytes.len(), chunks, "stored chunked value");
        self.absent.remove(key);
        self.stats.record_write(chunks);
        Ok(true)
    }
}
