//! # Handshake
//!
//! Application-level liveness check run on reliable channel 0 before a
//! peer is considered connected.
//!
//! The scramble is a fixed-key XOR involution: it detects tampering and
//! keeps the exchange symmetric, and it is explicitly *not*
//! cryptography. The 8-byte wire form is pinned to little-endian; any
//! other payload length on channel 0 during the handshake is a protocol
//! error that resets the peer.
//!
//! Server flow: on transport connect, send `scramble(now + 2)` and
//! queue the peer FIFO; the key doubles as the absolute expiry
//! timestamp. The client XORs the decrypted key with its connect-id
//! salt and echoes; the server verifies and echoes back; the client
//! verifies the echo against its derived key.

use std::collections::VecDeque;

use crate::transport::PeerId;

/// Seconds a peer may sit in the handshake before the server resets it.
pub const HANDSHAKE_TIMEOUT_SECS: i64 = 2;

/// Exact size of a handshake payload on the wire.
pub const HANDSHAKE_PAYLOAD_LEN: usize = 8;

const SCRAMBLE_KEY_A: i64 = 0xDEAD_BEEF_C0DE_CAFE_u64 as i64;
const SCRAMBLE_KEY_B: i64 = 0xC0DE_FACE_1234_5678_u64 as i64;

/// Fixed-key XOR involution: `scramble(scramble(x)) == x`.
#[must_use]
pub const fn scramble(value: i64) -> i64 {
    (value ^ SCRAMBLE_KEY_A) ^ SCRAMBLE_KEY_B
}

/// Encodes a handshake key for the wire (scrambled, little-endian).
#[must_use]
pub(crate) fn encode(key: i64) -> [u8; HANDSHAKE_PAYLOAD_LEN] {
    scramble(key).to_le_bytes()
}

/// Decodes a wire payload back to the plain value, or `None` if the
/// length is wrong.
#[must_use]
pub(crate) fn decode(payload: &[u8]) -> Option<i64> {
    let bytes: [u8; HANDSHAKE_PAYLOAD_LEN] = payload.try_into().ok()?;
    Some(scramble(i64::from_le_bytes(bytes)))
}

/// The per-peer salt mixed into the challenge: `connect_id + 1`, shared
/// by both ends of the transport connection.
#[must_use]
pub(crate) const fn salt(connect_id: u32) -> i64 {
    connect_id.wrapping_add(1) as i64
}

/// FIFO queue of peers awaiting handshake completion.
///
/// Insertion order guarantees monotonic expiry, so only the head needs
/// inspecting per service tick.
#[derive(Default)]
pub(crate) struct HandshakeQueue {
    peers: VecDeque<PeerId>,
}

impl HandshakeQueue {
    pub(crate) fn push(&mut self, peer: PeerId) {
        self.peers.push_back(peer);
    }

    pub(crate) fn remove(&mut self, peer: PeerId) {
        self.peers.retain(|&queued| queued != peer);
    }

    pub(crate) fn front(&self) -> Option<PeerId> {
        self.peers.front().copied()
    }

    pub(crate) fn pop(&mut self) -> Option<PeerId> {
        self.peers.pop_front()
    }

    pub(crate) fn clear(&mut self) {
        self.peers.clear();
    }
}
