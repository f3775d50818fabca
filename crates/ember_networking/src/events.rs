//! Session-layer records emitted onto the engine bus.

use crate::connection::Connection;
use crate::session::{MessageKind, SessionEventKind};

/// A connection lifecycle event (connect, disconnect, timeout).
#[derive(Clone, Copy, Debug)]
pub struct PeerEvent {
    /// Handle to the affected peer. Re-check validity before use; the
    /// slot may have been reused since.
    pub connection: Connection,
    /// Transport-supplied user value (connect data, disconnect data).
    pub data: u32,
    /// What happened.
    pub kind: SessionEventKind,
}

/// An application message received from a connected peer.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    /// Handle to the sending peer.
    pub connection: Connection,
    /// Message payload.
    pub data: Vec<u8>,
    /// Delivery class the payload arrived with.
    pub kind: MessageKind,
    /// Channel it arrived on.
    pub channel: u8,
}

/// One record produced by a network service pass, in drain order.
///
/// The manager re-emits these on the engine bus after the pass, so bus
/// handlers are free to call back into the manager.
#[derive(Clone, Debug)]
pub enum NetworkOutput {
    /// A lifecycle event.
    Event(PeerEvent),
    /// An application message.
    Message(InboundMessage),
}
