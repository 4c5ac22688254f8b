//! Coalesced multi-key reads.
//!
//! A read of any number of logical keys costs at most two round trips:
//!
//! 1. One `get_multi` for chunk 0 of every key.
//! 2. If any chunk 0 announces further parts, one `get_multi` for all of
//!    those parts across all keys.
//!
//! A chunked value with a missing part is deleted and reported absent; a
//! truncated value is never returned.

use crate::chunked::NonexistenceCache;
use crate::error::CoreResult;
use crate::failover::Pool;
use crate::key::KeyEncoder;
use crate::stats::ClientStats;
use memchunk_codec::Flags;
use memchunk_store::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// A value whose chunk 0 announced further chunks.
struct Pending {
    key: String,
    head: Vec<u8>,
    chunk_keys: Vec<String>,
}

/// Batched reader for chunked values.
pub(crate) struct Coalescer {
    pool: Arc<Pool>,
    encoder: Arc<dyn KeyEncoder>,
    absent: Arc<NonexistenceCache>,
    stats: Arc<ClientStats>,
}

impl Coalescer {
    pub(crate) fn new(
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
        }
    }

    /// Fetches and reassembles the values of `keys`.
    ///
    /// The result has one entry per distinct requested key; `None` marks an
    /// absent or corrupt value.
    pub(crate) fn get_many<S: AsRef<str>>(
        &self,
        keys: &[S],
    ) -> CoreResult<HashMap<String, Option<Vec<u8>>>> {
        let mut seen = HashSet::with_capacity(keys.len());
        let logical: Vec<&str> = keys
            .iter()
            .map(AsRef::as_ref)
            .filter(|k| seen.insert(*k))
            .collect();

        let mut result = HashMap::with_capacity(logical.len());
        if logical.is_empty() {
            return Ok(result);
        }

        let physical: Vec<String> = logical.iter().map(|k| self.encoder.encode(k)).collect();
        let mut heads = self.pool.get_multi(&physical)?;

        let mut pending = Vec::new();
        for (key, physical_key) in logical.iter().zip(&physical) {
            let Some(entry) = heads.remove(physical_key) else {
                result.insert((*key).to_string(), None);
                continue;
            };

            match Flags::decode(entry.flags).part_count {
                // not written by a chunk-aware client
                None => {
                    debug!(key, "entry has no chunk metadata, treating as absent");
                    result.insert((*key).to_string(), None);
                }
                Some(0) => {
                    result.insert((*key).to_string(), Some(entry.value));
                }
                Some(parts) => {
                    let chunk_keys = (1..=parts)
                        .map(|index| self.encoder.chunk_key(key, index))
                        .collect();
                    pending.push(Pending {
                        key: (*key).to_string(),
                        head: entry.value,
                        chunk_keys,
                    });
                }
            }
        }

        if !pending.is_empty() {
            let wanted: Vec<String> = pending
                .iter()
                .flat_map(|p| p.chunk_keys.iter().cloned())
                .collect();
            debug!(
                values = pending.len(),
                chunks = wanted.len(),
                "fetching chunk tails"
            );
            let mut tails = self.pool.get_multi(&wanted)?;

            for p in pending {
                let value = Self::reassemble(p.head, &p.chunk_keys, &mut tails);
                if value.is_none() {
                    warn!(key = %p.key, "chunked value is missing a part, deleting");
                    self.stats.record_corrupt_entry();
                    self.pool.delete(&self.encoder.encode(&p.key))?;
                } else {
                    self.stats.record_chunked_read();
                }
                result.insert(p.key, value);
            }
        }

        for (key, value) in &result {
            if value.is_some() {
                self.stats.record_hit();
            } else {
                self.stats.record_miss();
                self.absent.insert(key);
            }
        }

        Ok(result)
    }

    fn reassemble(
        head: Vec<u8>,
        chunk_keys: &[String],
        tails: &mut HashMap<String, Entry>,
    ) -> Option<Vec<u8>> {
        let mut value = head;
        for chunk_key in chunk_keys {
            let chunk = tails.remove(chunk_key)?;
            value.extend_from_slice(&chunk.value);
        }
        Some(value)
    }
}
