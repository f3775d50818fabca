//! # Peer Sessions
//!
//! Per-slot state with generation-versioned reuse.
//!
//! A slot is allocated once at host creation and lives until the
//! network shuts down; its 8-bit `sequence` is bumped every time the
//! slot is reused for a new remote, which is what invalidates old
//! [`crate::Connection`] handles.

use std::any::Any;

use crate::transport::PacketFlags;

/// Connection state of a peer slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum PeerState {
    /// Slot is free or the remote is gone. Terminal.
    #[default]
    Disconnected = 0,
    /// Application requested a disconnect; waiting for the transport to
    /// confirm.
    Disconnecting = 1,
    /// Transport-level connect in flight.
    Connecting = 2,
    /// Transport connected; application handshake in progress.
    Handshake = 3,
    /// Handshake verified; messages flow.
    Connected = 4,
}

/// Kind of a session-level [`crate::PeerEvent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionEventKind {
    /// Orderly disconnect confirmed by the transport.
    Disconnect = 0,
    /// The transport gave up on the remote.
    Timeout = 1,
    /// Handshake completed; the peer is live.
    Connect = 2,
}

/// How to tear a connection down.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum DisconnectMode {
    /// Disconnect after all queued outgoing packets are sent.
    #[default]
    Default = 0,
    /// Disconnect on the next service tick; pending outbound is dropped.
    Update = 1,
    /// Reset the slot immediately without notifying the remote.
    Force = 2,
    /// Force-send queued outbound now, then disconnect.
    Now = 3,
}

/// Delivery class of an application message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    /// Not reliable, not sequenced.
    None = 0,
    /// Reliable and sequenced.
    #[default]
    Reliable = 1,
    /// Unreliable, fragmented when larger than the MTU.
    Fragmented = 2,
    /// Unreliable and unsequenced.
    Unsequenced = 3,
}

impl MessageKind {
    /// Maps the message class onto transport packet flags.
    #[must_use]
    pub const fn to_flags(self) -> PacketFlags {
        match self {
            Self::None => PacketFlags::NONE,
            Self::Reliable => PacketFlags::RELIABLE.union(PacketFlags::SEQUENCED),
            Self::Fragmented => PacketFlags::FRAGMENTED,
            Self::Unsequenced => PacketFlags::UNSEQUENCED,
        }
    }

    /// Maps received transport flags back onto a message class.
    ///
    /// Unknown combinations are coerced to [`MessageKind::Reliable`]
    /// with a warning.
    #[must_use]
    pub fn from_flags(flags: PacketFlags) -> Self {
        if flags == PacketFlags::NONE {
            Self::None
        } else if flags == PacketFlags::RELIABLE.union(PacketFlags::SEQUENCED) {
            Self::Reliable
        } else if flags == PacketFlags::FRAGMENTED {
            Self::Fragmented
        } else if flags == PacketFlags::UNSEQUENCED {
            Self::Unsequenced
        } else {
            tracing::warn!(
                flags = flags.bits(),
                "unknown packet flag combination, coercing to reliable"
            );
            Self::Reliable
        }
    }
}

/// Per-slot session state.
pub struct PeerSession {
    /// Current connection state.
    pub(crate) state: PeerState,
    /// Slot generation, bumped on every reuse.
    pub(crate) sequence: u8,
    /// Handshake challenge; doubles as the absolute expiry timestamp on
    /// the server side.
    pub(crate) handshake_key: i64,
    /// Opaque application payload. The core never inspects it.
    pub(crate) user_data: Option<Box<dyn Any>>,
}

impl PeerSession {
    pub(crate) fn new() -> Self {
        Self {
            state: PeerState::Disconnected,
            sequence: 0,
            handshake_key: 0,
            user_data: None,
        }
    }

    /// Claims the slot for a new remote: bumps the generation (stale
    /// handles become no-ops) and enters `state`.
    pub(crate) fn reuse(&mut self, state: PeerState) {
        self.sequence = self.sequence.wrapping_add(1);
        self.state = state;
        self.handshake_key = 0;
        self.user_data = None;
    }

    /// Returns the slot to `Disconnected` without bumping the
    /// generation; state checks already no-op every operation on a
    /// disconnected peer.
    pub(crate) fn reset(&mut self) {
        self.state = PeerState::Disconnected;
        self.handshake_key = 0;
        self.user_data = None;
    }
}
