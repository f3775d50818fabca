//! Virtual-network configuration.

use std::net::{SocketAddr, ToSocketAddrs};

use serde::{Deserialize, Serialize};

use crate::error::{NetworkError, NetworkResult};

/// Configuration for a virtual network host.
///
/// Servers bind `address:port`; clients resolve it as the remote
/// endpoint. `data` is an opaque value handed to the remote side with
/// the transport-level connect.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Bind address (server) or remote address (client).
    pub address: String,
    /// Bind port (server) or remote port (client).
    pub port: u16,
    /// Number of peer slots to provision.
    pub peers: u16,
    /// Number of channels per peer.
    pub channels: u8,
    /// Opaque user value carried by the transport connect.
    pub data: u32,
    /// Inbound bandwidth hint in bytes/sec (0 = unlimited).
    pub bandwidth_in: u32,
    /// Outbound bandwidth hint in bytes/sec (0 = unlimited).
    pub bandwidth_out: u32,
}

impl NetworkConfig {
    /// Creates a config with the essentials; hints default to unlimited.
    #[must_use]
    pub fn new(address: impl Into<String>, port: u16, peers: u16, channels: u8) -> Self {
        Self {
            address: address.into(),
            port,
            peers,
            channels,
            data: 0,
            bandwidth_in: 0,
            bandwidth_out: 0,
        }
    }

    /// Sets the opaque connect value.
    #[must_use]
    pub fn with_data(mut self, data: u32) -> Self {
        self.data = data;
        self
    }

    /// Resolves `address:port` to a socket address.
    ///
    /// # Errors
    ///
    /// [`NetworkError::AddressResolve`] if resolution yields nothing.
    pub fn resolve(&self) -> NetworkResult<SocketAddr> {
        (self.address.as_str(), self.port)
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| NetworkError::AddressResolve {
                address: self.address.clone(),
                port: self.port,
            })
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::new("127.0.0.1", 0, 32, 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_localhost() {
        let config = NetworkConfig::new("127.0.0.1", 7777, 8, 2);
        let addr = config.resolve().expect("localhost resolves");
        assert_eq!(addr.port(), 7777);
    }

    #[test]
    fn test_resolve_failure() {
        let config = NetworkConfig::new("no.such.host.invalid", 1, 1, 1);
        assert!(matches!(
            config.resolve(),
            Err(NetworkError::AddressResolve { .. })
        ));
    }
}
