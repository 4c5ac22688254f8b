//! # memchunk Store
//!
//! Client trait for the size-limited, flag-annotated key-value store that
//! memchunk sits on top of.
//!
//! A store client is an **opaque entry store**: it keeps a byte value and a
//! 32-bit flags integer per key, with an optional expiry. It does not
//! interpret values or flags beyond the low-bit compression indicator it owns.
//!
//! ## Design Principles
//!
//! - Clients are already connected; memchunk only orchestrates calls
//! - Keys passed in are physical keys (already encoded by the caller)
//! - Must be `Send + Sync` so one client can serve many threads
//! - Reachability problems are reported as [`StoreError::ServerUnreachable`]
//!   so the caller can fail the server over
//!
//! ## Available Clients
//!
//! - [`InMemoryStore`] - Simulated server pool for tests and tooling
//!
//! ## Example
//!
//! ```rust
//! use memchunk_store::{InMemoryStore, ServerAddr, StoreClient};
//! use std::time::Duration;
//!
//! let store = InMemoryStore::new();
//! store.add_server(&ServerAddr::new("127.0.0.1", 11211), false).unwrap();
//! store.set("greeting", b"hello", 0, Duration::ZERO).unwrap();
//! let entry = store.get("greeting").unwrap().unwrap();
//! assert_eq!(entry.value, b"hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod error;
mod memory;
mod server;

pub use client::{Entry, ServerStats, StoreClient};
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use server::ServerAddr;
