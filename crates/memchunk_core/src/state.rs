//! Persisted client state.
//!
//! A [`ClientState`] captures what is needed to rebuild a client: its
//! configuration and the servers that were still active. It is stored as
//! CBOR with a schema version. A state written by a different schema
//! version is refused rather than reinterpreted.

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use memchunk_store::ServerAddr;
use serde::{Deserialize, Serialize};

/// Current client state schema version.
pub const STATE_VERSION: u16 = 1;

/// A snapshot of a client's configuration and active servers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientState {
    /// Schema version of this snapshot.
    pub version: u16,
    /// Client configuration.
    pub config: Config,
    /// Servers still active when the snapshot was taken.
    pub active_servers: Vec<ServerAddr>,
}

/// The leading field of every state, whatever its version.
#[derive(Deserialize)]
struct StateHeader {
    version: u16,
}

impl ClientState {
    /// Creates a snapshot at the current schema version.
    pub fn new(config: Config, active_servers: Vec<ServerAddr>) -> Self {
        Self {
            version: STATE_VERSION,
            config,
            active_servers,
        }
    }

    /// Encodes the snapshot to bytes.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        Ok(memchunk_codec::to_bytes(self)?)
    }

    /// Decodes a snapshot, checking its schema version first.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StateVersionMismatch`] if the version differs from
    /// [`STATE_VERSION`], or a codec error if the bytes are not a state.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        let header: StateHeader = memchunk_codec::from_bytes(data)?;
        if header.version != STATE_VERSION {
            return Err(CoreError::StateVersionMismatch {
                expected: STATE_VERSION,
                found: header.version,
            });
        }
        Ok(memchunk_codec::from_bytes(data)?)
    }

    /// Returns the configuration to reopen a client with: the saved config
    /// restricted to the servers that were still active.
    pub fn into_config(self) -> Config {
        let mut config = self.config;
        config.servers = self.active_servers;
        config
    }
}
