//! Error types for the session layer.
//!
//! Recoverable failures surface as [`NetworkError`]; stale-handle
//! operations are silent no-ops by contract and never error.

use thiserror::Error;

/// Errors that can occur in the session layer.
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Hostname/port did not resolve to a usable socket address.
    #[error("failed to resolve address {address}:{port}")]
    AddressResolve {
        /// The address that failed to resolve.
        address: String,
        /// The port it was paired with.
        port: u16,
    },

    /// The underlying transport could not be created or bound.
    #[error("failed to create transport host: {0}")]
    HostCreate(#[from] std::io::Error),

    /// `create_server`/`create_client` on a network whose host exists.
    #[error("network is already in use")]
    AlreadyInUse,

    /// Every peer slot of the host is occupied.
    #[error("no free peer slot available")]
    PeersExhausted,
}

/// Result type for session-layer operations.
pub type NetworkResult<T> = Result<T, NetworkError>;
