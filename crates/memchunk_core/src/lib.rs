//! # memchunk Core
//!
//! Client layer over a memcache-style server pool.
//!
//! This crate provides:
//! - Key encoding for self-hashing and externally-hashed backends
//! - Transparent chunking of values larger than the per-entry limit
//! - Multi-key reads in at most two round trips
//! - Spinlock-style distributed locks with crash release
//! - Failover when servers become unreachable
//!
//! ## Example
//!
//! ```rust
//! use memchunk_core::{Client, Config, InMemoryStore};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let store = Arc::new(InMemoryStore::new());
//! let config = Config::new()
//!     .server("127.0.0.1", 11211)
//!     .max_chunk_size(1024);
//! let client = Client::open(config, store.clone()).unwrap();
//!
//! let big = vec![7u8; 4000];
//! assert!(client.set("blob", &big, Duration::ZERO).unwrap());
//! assert_eq!(client.get::<Vec<u8>>("blob").unwrap(), Some(big));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod chunked;
mod client;
mod config;
mod error;
mod failover;
mod key;
mod lock;
mod multiget;
mod state;
mod stats;

pub use client::Client;
pub use config::{
    BackendKind, Config, LockBackoff, DEFAULT_COMPRESSION_THRESHOLD, DEFAULT_LOCK_EXPIRY,
    DEFAULT_MAX_CHUNK_SIZE,
};
pub use error::{CoreError, CoreResult};
pub use failover::FailoverTracker;
pub use key::{
    encoder_for, ExternalHashingEncoder, KeyEncoder, SelfHashingEncoder, CHUNK_SEPARATOR,
    LOCK_SUFFIX,
};
pub use lock::crash_hook_installed;
pub use state::{ClientState, STATE_VERSION};
pub use stats::ClientStats;

pub use memchunk_store::{
    Entry, InMemoryStore, ServerAddr, ServerStats, StoreClient, StoreError, StoreResult,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
