//! # Transport Layer
//!
//! The contract the session layer needs from an unreliable-datagram
//! transport with reliable/sequenced channels, plus two
//! implementations:
//!
//! - [`udp::UdpHost`]: non-blocking UDP with an ack/resend reliability
//!   layer, sequenced-drop, fragmentation and keepalive timeouts.
//! - [`memory::MemoryHost`]: an in-process loopback pair for
//!   deterministic tests and simulations.
//!
//! Reliable delivery here is resend-until-ack with duplicate
//! suppression; sequenced flags drop stale datagrams rather than
//! re-ordering. Peers are identified by dense slot ids that map 1:1
//! onto the session layer's peer array.

pub mod memory;
pub mod udp;

use std::net::SocketAddr;

use crate::error::NetworkResult;

/// Identifies a peer slot within a host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PeerId(pub u16);

/// Delivery flag bits carried by every packet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PacketFlags(u8);

impl PacketFlags {
    /// No delivery guarantees.
    pub const NONE: Self = Self(0);
    /// Flag: resend until acknowledged.
    pub const RELIABLE: Self = Self(1 << 0);
    /// Flag: drop datagrams older than the newest seen on the channel.
    pub const SEQUENCED: Self = Self(1 << 1);
    /// Flag: deliver in arrival order, no sequencing at all.
    pub const UNSEQUENCED: Self = Self(1 << 2);
    /// Flag: split payloads larger than the MTU into fragments.
    pub const FRAGMENTED: Self = Self(1 << 3);

    /// Raw bit value.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Reconstructs flags from raw bits.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// True if every bit of `other` is set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Bitwise union.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// A framed payload plus its delivery flags.
#[derive(Clone, Debug)]
pub struct Packet {
    /// Delivery flags.
    pub flags: PacketFlags,
    /// Message bytes.
    pub payload: Vec<u8>,
}

impl Packet {
    /// Creates a packet with explicit flags.
    #[must_use]
    pub fn new(flags: PacketFlags, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            flags,
            payload: payload.into(),
        }
    }

    /// Creates a reliable, sequenced packet.
    #[must_use]
    pub fn reliable(payload: impl Into<Vec<u8>>) -> Self {
        Self::new(
            PacketFlags::RELIABLE.union(PacketFlags::SEQUENCED),
            payload,
        )
    }
}

/// Kind of a transport event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportEventKind {
    /// A peer completed the transport-level connect.
    Connect,
    /// A peer disconnected in an orderly way.
    Disconnect,
    /// A peer stopped responding.
    DisconnectTimeout,
    /// A packet arrived.
    Receive,
}

/// One event drained from a host.
#[derive(Clone, Debug)]
pub struct TransportEvent {
    /// What happened.
    pub kind: TransportEventKind,
    /// The peer slot it happened to.
    pub peer: PeerId,
    /// Channel (meaningful for `Receive`).
    pub channel: u8,
    /// Opaque user value (connect data, disconnect data).
    pub data: u32,
    /// Payload (present for `Receive`).
    pub packet: Option<Packet>,
}

/// One transport host: a bound server endpoint or a client endpoint,
/// with a fixed array of peer slots.
pub trait Host {
    /// Number of peer slots.
    fn peer_count(&self) -> u16;

    /// Number of channels per peer.
    fn channel_count(&self) -> u8;

    /// Non-blocking event poll.
    fn check_events(&mut self) -> Option<TransportEvent>;

    /// Event poll that may block up to `timeout_ms` (0 = non-blocking).
    fn service(&mut self, timeout_ms: u32) -> Option<TransportEvent>;

    /// Initiates an outgoing connection on a free peer slot.
    ///
    /// # Errors
    ///
    /// [`crate::NetworkError::PeersExhausted`] when every slot is taken,
    /// or a transport error from the underlying socket.
    fn connect(&mut self, remote: SocketAddr, data: u32) -> NetworkResult<PeerId>;

    /// Sends a packet to a connected peer. Returns false if the peer or
    /// channel is invalid or the send failed.
    fn send(&mut self, peer: PeerId, channel: u8, packet: Packet) -> bool;

    /// Sends a packet to every connected peer.
    fn broadcast(&mut self, channel: u8, packet: Packet);

    /// Disconnects after all queued outgoing packets are delivered.
    fn disconnect_later(&mut self, peer: PeerId, data: u32);

    /// Disconnects on the next service pass, dropping queued outbound.
    fn disconnect(&mut self, peer: PeerId, data: u32);

    /// Force-sends queued outbound immediately, then disconnects.
    fn disconnect_now(&mut self, peer: PeerId, data: u32);

    /// Frees the slot immediately. No notification, no event.
    fn reset(&mut self, peer: PeerId);

    /// Pushes queued outbound onto the wire without waiting for the
    /// next service pass.
    fn flush(&mut self);

    /// The connect-id shared by both ends of the peer's connection
    /// (0 for free slots).
    fn connect_id(&self, peer: PeerId) -> u32;

    /// True if the slot holds a transport-level connection.
    fn is_connected(&self, peer: PeerId) -> bool;
}
