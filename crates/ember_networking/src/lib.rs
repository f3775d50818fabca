//! # Ember Networking
//!
//! Reliable-UDP session layer multiplexing many virtual networks.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      NETWORK MANAGER                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐         │
//! │  │ Network #0  │   │ Network #1  │   │ Network #N  │         │
//! │  │ (server)    │   │ (client)    │   │ ...         │         │
//! │  └──────┬──────┘   └──────┬──────┘   └──────┬──────┘         │
//! │         │                 │                 │                │
//! │   peer sessions     peer sessions     peer sessions          │
//! │   handshake queue   handshake queue   handshake queue        │
//! │         │                 │                 │                │
//! │  ┌──────▼─────────────────▼─────────────────▼──────┐         │
//! │  │      transport hosts (UDP / in-memory)          │         │
//! │  └─────────────────────────────────────────────────┘         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick, the manager drains every network's transport events,
//! advances the per-peer state machines (handshake, disconnect modes,
//! timeouts) and emits [`PeerEvent`] and [`InboundMessage`] records on
//! the engine bus in drain order.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod handshake;
pub mod manager;
pub mod network;
pub mod session;
pub mod transport;

pub use config::NetworkConfig;
pub use connection::Connection;
pub use error::{NetworkError, NetworkResult};
pub use events::{InboundMessage, NetworkOutput, PeerEvent};
pub use handshake::{scramble, HANDSHAKE_TIMEOUT_SECS};
pub use manager::NetworkManager;
pub use network::Network;
pub use session::{DisconnectMode, MessageKind, PeerState, SessionEventKind};
pub use transport::{Host, Packet, PacketFlags, PeerId, TransportEvent, TransportEventKind};

/// Default cap on transport events drained per network per tick.
pub const EVENTS_LIMIT: u32 = 100;

/// Default transport service timeout in milliseconds (non-blocking).
pub const SERVICE_TIMEOUT_MS: u32 = 0;
