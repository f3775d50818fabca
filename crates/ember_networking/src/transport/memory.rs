//! # Loopback Transport
//!
//! An in-process host pair connected by channels. Delivery is lossless
//! and ordered, so every flag class trivially meets its guarantee;
//! flags are carried through verbatim for the receive-side mapping.
//!
//! Used by the session-layer test suite and simulations where the UDP
//! stack's timing would make runs non-deterministic.

use std::collections::VecDeque;
use std::net::SocketAddr;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::error::{NetworkError, NetworkResult};
use crate::transport::{
    Host, Packet, PacketFlags, PeerId, TransportEvent, TransportEventKind,
};

/// One frame crossing between the paired hosts.
enum Frame {
    Connect {
        from: u16,
        connect_id: u32,
        data: u32,
    },
    Accept {
        to: u16,
        from: u16,
        data: u32,
    },
    Data {
        to: u16,
        channel: u8,
        flags: u8,
        payload: Vec<u8>,
    },
    Disconnect {
        to: u16,
        data: u32,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum SlotState {
    #[default]
    Free,
    Connecting,
    Connected,
}

#[derive(Default)]
struct Slot {
    state: SlotState,
    remote: u16,
    connect_id: u32,
}

/// One end of an in-memory host pair.
pub struct MemoryHost {
    slots: Vec<Slot>,
    channels: u8,
    inbox: Receiver<Frame>,
    outbox: Sender<Frame>,
    pending: VecDeque<TransportEvent>,
    next_connect_id: u32,
}

impl MemoryHost {
    /// Creates a cross-wired host pair.
    #[must_use]
    pub fn pair(peers_a: u16, peers_b: u16, channels: u8) -> (Self, Self) {
        let (to_b, from_a) = unbounded();
        let (to_a, from_b) = unbounded();

        let a = Self::new(peers_a, channels, from_b, to_b, 0x1000);
        let b = Self::new(peers_b, channels, from_a, to_a, 0x2000);
        (a, b)
    }

    fn new(
        peers: u16,
        channels: u8,
        inbox: Receiver<Frame>,
        outbox: Sender<Frame>,
        connect_id_base: u32,
    ) -> Self {
        Self {
            slots: (0..peers).map(|_| Slot::default()).collect(),
            channels,
            inbox,
            outbox,
            pending: VecDeque::new(),
            next_connect_id: connect_id_base,
        }
    }

    fn free_slot(&self) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.state == SlotState::Free)
    }

    /// Drains the inbox, translating frames into transport events.
    fn pump(&mut self) {
        while let Ok(frame) = self.inbox.try_recv() {
            match frame {
                Frame::Connect {
                    from,
                    connect_id,
                    data,
                } => {
                    let Some(index) = self.free_slot() else {
                        continue;
                    };
                    self.slots[index] = Slot {
                        state: SlotState::Connected,
                        remote: from,
                        connect_id,
                    };
                    let _ = self.outbox.send(Frame::Accept {
                        to: from,
                        from: index as u16,
                        data,
                    });
                    self.pending.push_back(TransportEvent {
                        kind: TransportEventKind::Connect,
                        peer: PeerId(index as u16),
                        channel: 0,
                        data,
                        packet: None,
                    });
                }
                Frame::Accept { to, from, data } => {
                    let Some(slot) = self.slots.get_mut(to as usize) else {
                        continue;
                    };
                    if slot.state != SlotState::Connecting {
                        continue;
                    }
                    slot.state = SlotState::Connected;
                    slot.remote = from;
                    self.pending.push_back(TransportEvent {
                        kind: TransportEventKind::Connect,
                        peer: PeerId(to),
                        channel: 0,
                        data,
                        packet: None,
                    });
                }
                Frame::Data {
                    to,
                    channel,
                    flags,
                    payload,
                } => {
                    let connected = self
                        .slots
                        .get(to as usize)
                        .is_some_and(|slot| slot.state == SlotState::Connected);
                    if !connected {
                        continue;
                    }
                    self.pending.push_back(TransportEvent {
                        kind: TransportEventKind::Receive,
                        peer: PeerId(to),
                        channel,
                        data: 0,
                        packet: Some(Packet::new(PacketFlags::from_bits(flags), payload)),
                    });
                }
                Frame::Disconnect { to, data } => {
                    let Some(slot) = self.slots.get_mut(to as usize) else {
                        continue;
                    };
                    if slot.state == SlotState::Free {
                        continue;
                    }
                    *slot = Slot::default();
                    self.pending.push_back(TransportEvent {
                        kind: TransportEventKind::Disconnect,
                        peer: PeerId(to),
                        channel: 0,
                        data,
                        packet: None,
                    });
                }
            }
        }
    }

    /// Tears a slot down, optionally notifying remote and self.
    fn teardown(&mut self, peer: PeerId, data: u32, notify: bool) {
        let index = peer.0 as usize;
        let Some(slot) = self.slots.get_mut(index) else {
            return;
        };
        if slot.state == SlotState::Free {
            return;
        }
        let remote = slot.remote;
        let was_connected = slot.state == SlotState::Connected;
        *slot = Slot::default();

        if notify {
            if was_connected {
                let _ = self.outbox.send(Frame::Disconnect { to: remote, data });
            }
            self.pending.push_back(TransportEvent {
                kind: TransportEventKind::Disconnect,
                peer,
                channel: 0,
                data,
                packet: None,
            });
        }
    }
}

impl Host for MemoryHost {
    fn peer_count(&self) -> u16 {
        self.slots.len() as u16
    }

    fn channel_count(&self) -> u8 {
        self.channels
    }

    fn check_events(&mut self) -> Option<TransportEvent> {
        self.pump();
        self.pending.pop_front()
    }

    fn service(&mut self, _timeout_ms: u32) -> Option<TransportEvent> {
        // Loopback delivery is immediate; there is nothing to wait for.
        self.check_events()
    }

    fn connect(&mut self, _remote: SocketAddr, data: u32) -> NetworkResult<PeerId> {
        let index = self.free_slot().ok_or(NetworkError::PeersExhausted)?;
        let connect_id = self.next_connect_id;
        self.next_connect_id += 1;

        self.slots[index] = Slot {
            state: SlotState::Connecting,
            remote: 0,
            connect_id,
        };
        let _ = self.outbox.send(Frame::Connect {
            from: index as u16,
            connect_id,
            data,
        });
        Ok(PeerId(index as u16))
    }

    fn send(&mut self, peer: PeerId, channel: u8, packet: Packet) -> bool {
        let Some(slot) = self.slots.get(peer.0 as usize) else {
            return false;
        };
        if slot.state != SlotState::Connected || channel >= self.channels {
            return false;
        }
        self.outbox
            .send(Frame::Data {
                to: slot.remote,
                channel,
                flags: packet.flags.bits(),
                payload: packet.payload,
            })
            .is_ok()
    }

    fn broadcast(&mut self, channel: u8, packet: Packet) {
        for index in 0..self.slots.len() {
            if self.slots[index].state == SlotState::Connected {
                self.send(PeerId(index as u16), channel, packet.clone());
            }
        }
    }

    fn disconnect_later(&mut self, peer: PeerId, data: u32) {
        // The loopback queue is always drained, so "after outbound" is now.
        self.teardown(peer, data, true);
    }

    fn disconnect(&mut self, peer: PeerId, data: u32) {
        self.teardown(peer, data, true);
    }

    fn disconnect_now(&mut self, peer: PeerId, data: u32) {
        self.teardown(peer, data, true);
    }

    fn reset(&mut self, peer: PeerId) {
        self.teardown(peer, 0, false);
    }

    fn flush(&mut self) {}

    fn connect_id(&self, peer: PeerId) -> u32 {
        self.slots
            .get(peer.0 as usize)
            .map_or(0, |slot| slot.connect_id)
    }

    fn is_connected(&self, peer: PeerId) -> bool {
        self.slots
            .get(peer.0 as usize)
            .is_some_and(|slot| slot.state == SlotState::Connected)
    }
}
