//! Logical to physical key encoding.
//!
//! Every key memchunk sends to the store goes through a [`KeyEncoder`].
//! Which encoder is used depends on the backend's routing behavior and is
//! fixed when the client is built:
//!
//! - [`SelfHashingEncoder`] passes keys through; the backend prefixes and
//!   hashes them itself.
//! - [`ExternalHashingEncoder`] digests `prefix + key` so independent
//!   clients agree on server placement.
//!
//! Chunk and lock keys are derived from the *logical* key and then encoded,
//! so they route independently of chunk 0.

use crate::config::BackendKind;
use sha2::{Digest, Sha256};
use std::fmt::Write;
use std::sync::Arc;

/// Separator between a logical key and a chunk index.
pub const CHUNK_SEPARATOR: &str = "_s";

/// Suffix appended to a logical key to form its lock entry.
pub const LOCK_SUFFIX: &str = "_lock";

/// Number of digest bytes kept by [`ExternalHashingEncoder`].
const DIGEST_BYTES: usize = 16;

/// Turns a logical key into the physical key sent to the store.
///
/// Encoding is a pure function of the logical key and the encoder's own
/// immutable settings.
pub trait KeyEncoder: Send + Sync + std::fmt::Debug {
    /// Encodes a logical key.
    fn encode(&self, logical: &str) -> String;

    /// Encodes the key of chunk `index` of `logical`.
    ///
    /// Chunk 0 is the logical key's own physical key.
    fn chunk_key(&self, logical: &str, index: u32) -> String {
        if index == 0 {
            self.encode(logical)
        } else {
            self.encode(&format!("{logical}{CHUNK_SEPARATOR}{index}"))
        }
    }

    /// Encodes the key of the lock entry for `logical`.
    fn lock_key(&self, logical: &str) -> String {
        self.encode(&format!("{logical}{LOCK_SUFFIX}"))
    }
}

/// Encoder for backends that hash and prefix keys internally.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfHashingEncoder;

impl KeyEncoder for SelfHashingEncoder {
    fn encode(&self, logical: &str) -> String {
        logical.to_string()
    }
}

/// Encoder for backends that need callers to pre-hash keys.
///
/// The physical key is the first 128 bits of `SHA-256(prefix + key)`
/// rendered as 32 lowercase hex digits.
#[derive(Debug, Clone, Default)]
pub struct ExternalHashingEncoder {
    prefix: String,
}

impl ExternalHashingEncoder {
    /// Creates an encoder for the given namespace prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl KeyEncoder for ExternalHashingEncoder {
    fn encode(&self, logical: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.prefix.as_bytes());
        hasher.update(logical.as_bytes());
        let digest = hasher.finalize();

        let mut hex = String::with_capacity(DIGEST_BYTES * 2);
        for byte in &digest[..DIGEST_BYTES] {
            let _ = write!(hex, "{byte:02x}");
        }
        hex
    }
}

/// Builds the encoder for a backend kind.
pub fn encoder_for(backend: BackendKind, prefix: &str) -> Arc<dyn KeyEncoder> {
    match backend {
        BackendKind::SelfHashing => Arc::new(SelfHashingEncoder),
        BackendKind::ExternalHashing => Arc::new(ExternalHashingEncoder::new(prefix)),
    }
}
