//! Server addresses.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default weight for a server that was not given one.
pub const DEFAULT_WEIGHT: u32 = 1;

/// Address of one server in the store pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerAddr {
    /// Host name or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Relative weight used by the client's own distribution.
    pub weight: u32,
}

impl ServerAddr {
    /// Creates an address with the default weight.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            weight: DEFAULT_WEIGHT,
        }
    }

    /// Sets the weight.
    #[must_use]
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// Returns true if this address names `host:port`.
    pub fn matches(&self, host: &str, port: u16) -> bool {
        self.host == host && self.port == port
    }
}

impl fmt::Display for ServerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_match() {
        let addr = ServerAddr::new("10.0.0.5", 11211).with_weight(3);
        assert_eq!(addr.to_string(), "10.0.0.5:11211");
        assert_eq!(addr.weight, 3);
        assert!(addr.matches("10.0.0.5", 11211));
        assert!(!addr.matches("10.0.0.5", 11212));
    }
}
