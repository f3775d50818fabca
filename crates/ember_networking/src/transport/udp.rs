//! # UDP Host
//!
//! Datagram transport over a non-blocking `std::net::UdpSocket` with:
//!
//! - connect/accept control packets carrying a shared connect-id
//! - an ack/resend reliability layer with a 256-slot dedup window
//! - sequenced-drop for sequenced unreliable traffic
//! - fragmentation and reassembly for oversized unreliable payloads
//! - keepalive pings and idle-timeout detection
//!
//! Every datagram starts with a fixed [`WireHeader`]; payload bytes
//! follow. Packets never exceed [`MAX_DATAGRAM`] on the wire.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use bytemuck::{Pod, Zeroable};

use crate::error::{NetworkError, NetworkResult};
use crate::transport::{
    Host, Packet, PacketFlags, PeerId, TransportEvent, TransportEventKind,
};

/// Maximum datagram size on the wire. Stays under common path MTUs.
pub const MAX_DATAGRAM: usize = 1200;

/// Payload budget of a single datagram.
pub const MAX_PAYLOAD: usize = MAX_DATAGRAM - WireHeader::SIZE;

const RESEND_INTERVAL: Duration = Duration::from_millis(100);
const MAX_RESENDS: u32 = 10;
const CONNECT_INTERVAL: Duration = Duration::from_millis(200);
const MAX_CONNECT_ATTEMPTS: u32 = 25;
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(1);
const IDLE_TIMEOUT: Duration = Duration::from_secs(8);
const DEDUP_WINDOW: usize = 256;

/// Fixed per-datagram header.
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
#[repr(C)]
struct WireHeader {
    /// Control kind (`KIND_*`).
    kind: u8,
    /// Packet flag bits.
    flags: u8,
    /// Channel index.
    channel: u8,
    /// Fragment count (0 or 1 = unfragmented).
    fragment_count: u8,
    /// Per-channel sequence number.
    sequence: u16,
    /// Fragment index within the message.
    fragment_index: u16,
    /// Opaque user value (connect data, disconnect data).
    data: u32,
}

impl WireHeader {
    const SIZE: usize = 12;

    const KIND_CONNECT: u8 = 1;
    const KIND_ACCEPT: u8 = 2;
    const KIND_DISCONNECT: u8 = 3;
    const KIND_PING: u8 = 4;
    const KIND_DATA: u8 = 5;
    const KIND_ACK: u8 = 6;
}

fn encode_datagram(header: &WireHeader, payload: &[u8]) -> Vec<u8> {
    let mut datagram = Vec::with_capacity(WireHeader::SIZE + payload.len());
    datagram.extend_from_slice(bytemuck::bytes_of(header));
    datagram.extend_from_slice(payload);
    datagram
}

/// A reliable datagram awaiting acknowledgment.
struct PendingReliable {
    channel: u8,
    sequence: u16,
    datagram: Vec<u8>,
    sent_at: Instant,
    resends: u32,
}

/// Partially reassembled fragmented message.
struct Reassembly {
    flags: u8,
    parts: Vec<Option<Vec<u8>>>,
    received: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum SlotState {
    #[default]
    Free,
    Connecting,
    Connected,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DisconnectStyle {
    /// After the reliable queue drains.
    Later,
    /// On the next service pass, dropping queued outbound.
    Update,
}

struct UdpPeer {
    state: SlotState,
    addr: SocketAddr,
    connect_id: u32,
    connect_data: u32,
    out_sequences: Vec<u16>,
    in_sequences: Vec<u16>,
    dedup: Vec<[bool; DEDUP_WINDOW]>,
    pending: Vec<PendingReliable>,
    reassembly: HashMap<(u8, u16), Reassembly>,
    last_recv: Instant,
    last_send: Instant,
    connect_attempts: u32,
    disconnect: Option<(DisconnectStyle, u32)>,
}

impl UdpPeer {
    fn free(channels: u8, now: Instant) -> Self {
        Self {
            state: SlotState::Free,
            addr: SocketAddr::from(([0, 0, 0, 0], 0)),
            connect_id: 0,
            connect_data: 0,
            out_sequences: vec![0; channels as usize],
            in_sequences: vec![0; channels as usize],
            dedup: vec![[false; DEDUP_WINDOW]; channels as usize],
            pending: Vec::new(),
            reassembly: HashMap::new(),
            last_recv: now,
            last_send: now,
            connect_attempts: 0,
            disconnect: None,
        }
    }

    fn claim(&mut self, state: SlotState, addr: SocketAddr, connect_id: u32, data: u32, now: Instant) {
        let channels = self.out_sequences.len();
        *self = Self::free(channels as u8, now);
        self.state = state;
        self.addr = addr;
        self.connect_id = connect_id;
        self.connect_data = data;
    }

    fn release(&mut self, now: Instant) {
        let channels = self.out_sequences.len();
        *self = Self::free(channels as u8, now);
    }

    fn next_sequence(&mut self, channel: u8) -> u16 {
        let slot = &mut self.out_sequences[channel as usize];
        let sequence = *slot;
        *slot = slot.wrapping_add(1);
        sequence
    }

    /// True if `sequence` is newer than the newest seen on `channel`
    /// (wrapping compare), updating the watermark when it is.
    fn accept_sequenced(&mut self, channel: u8, sequence: u16) -> bool {
        let newest = &mut self.in_sequences[channel as usize];
        let diff = sequence.wrapping_sub(*newest);
        if diff == 0 || diff < 32768 {
            *newest = sequence;
            true
        } else {
            false
        }
    }

    /// Duplicate suppression for reliable datagrams.
    fn mark_seen(&mut self, channel: u8, sequence: u16) -> bool {
        let slot = &mut self.dedup[channel as usize][(sequence as usize) % DEDUP_WINDOW];
        let duplicate = *slot;
        *slot = true;
        // Clear the slot half a window ahead so the marker expires
        // before the sequence space wraps back onto it.
        let ahead = (sequence.wrapping_add((DEDUP_WINDOW / 2) as u16) as usize) % DEDUP_WINDOW;
        self.dedup[channel as usize][ahead] = false;
        !duplicate
    }
}

/// UDP transport host.
pub struct UdpHost {
    socket: UdpSocket,
    local_addr: SocketAddr,
    peers: Vec<UdpPeer>,
    channels: u8,
    server: bool,
    events: VecDeque<TransportEvent>,
    next_connect_id: u32,
}

impl UdpHost {
    /// Binds a server host to `bind` with `peers` slots.
    ///
    /// # Errors
    ///
    /// [`NetworkError::HostCreate`] when the bind fails.
    pub fn server(bind: SocketAddr, peers: u16, channels: u8) -> NetworkResult<Self> {
        Self::bound(bind, peers, channels, true)
    }

    /// Creates a client host on an ephemeral local port.
    ///
    /// # Errors
    ///
    /// [`NetworkError::HostCreate`] when the bind fails.
    pub fn client(peers: u16, channels: u8) -> NetworkResult<Self> {
        Self::bound(SocketAddr::from(([0, 0, 0, 0], 0)), peers, channels, false)
    }

    fn bound(bind: SocketAddr, peers: u16, channels: u8, server: bool) -> NetworkResult<Self> {
        let socket = UdpSocket::bind(bind)?;
        socket.set_nonblocking(true)?;
        let local_addr = socket.local_addr()?;
        let now = Instant::now();

        Ok(Self {
            socket,
            local_addr,
            peers: (0..peers).map(|_| UdpPeer::free(channels, now)).collect(),
            channels,
            server,
            events: VecDeque::new(),
            next_connect_id: 1,
        })
    }

    /// The address this host is bound to (useful for port-0 binds).
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// True if this host was created as a server.
    #[must_use]
    pub fn is_server(&self) -> bool {
        self.server
    }

    fn find_peer(&self, addr: SocketAddr) -> Option<usize> {
        self.peers
            .iter()
            .position(|peer| peer.state != SlotState::Free && peer.addr == addr)
    }

    fn free_slot(&self) -> Option<usize> {
        self.peers
            .iter()
            .position(|peer| peer.state == SlotState::Free)
    }

    fn send_raw(&mut self, index: usize, datagram: &[u8]) -> bool {
        let addr = self.peers[index].addr;
        match self.socket.send_to(datagram, addr) {
            Ok(_) => {
                self.peers[index].last_send = Instant::now();
                true
            }
            Err(error) => {
                tracing::debug!(%addr, %error, "udp send failed");
                false
            }
        }
    }

    fn send_control(&mut self, index: usize, kind: u8, data: u32, payload: &[u8]) -> bool {
        let header = WireHeader {
            kind,
            data,
            ..WireHeader::default()
        };
        let datagram = encode_datagram(&header, payload);
        self.send_raw(index, &datagram)
    }

    /// Reads every waiting datagram, then runs per-peer timers.
    fn pump(&mut self) {
        let mut buffer = [0u8; MAX_DATAGRAM];
        loop {
            match self.socket.recv_from(&mut buffer) {
                Ok((length, addr)) => self.handle_datagram(&buffer[..length], addr),
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => break,
                Err(error) => {
                    tracing::debug!(%error, "udp recv failed");
                    break;
                }
            }
        }
        self.run_timers();
    }

    fn handle_datagram(&mut self, datagram: &[u8], addr: SocketAddr) {
        if datagram.len() < WireHeader::SIZE {
            return;
        }
        let header: WireHeader = bytemuck::pod_read_unaligned(&datagram[..WireHeader::SIZE]);
        let payload = &datagram[WireHeader::SIZE..];

        match header.kind {
            WireHeader::KIND_CONNECT => self.on_connect_request(&header, payload, addr),
            WireHeader::KIND_ACCEPT => self.on_accept(&header, addr),
            WireHeader::KIND_DISCONNECT => self.on_remote_disconnect(&header, addr),
            WireHeader::KIND_PING => {
                if let Some(index) = self.find_peer(addr) {
                    self.peers[index].last_recv = Instant::now();
                }
            }
            WireHeader::KIND_ACK => self.on_ack(&header, addr),
            WireHeader::KIND_DATA => self.on_data(&header, payload, addr),
            _ => tracing::debug!(kind = header.kind, "unknown datagram kind"),
        }
    }

    fn on_connect_request(&mut self, header: &WireHeader, payload: &[u8], addr: SocketAddr) {
        if !self.server {
            return;
        }
        let Ok(id_bytes) = <[u8; 4]>::try_from(payload) else {
            return;
        };
        let connect_id = u32::from_le_bytes(id_bytes);

        // Retransmitted connect: just re-accept.
        if let Some(index) = self.find_peer(addr) {
            self.send_control(index, WireHeader::KIND_ACCEPT, header.data, &connect_id.to_le_bytes());
            return;
        }

        let Some(index) = self.free_slot() else {
            tracing::warn!(%addr, "connect refused: no free peer slot");
            return;
        };
        let now = Instant::now();
        self.peers[index].claim(SlotState::Connected, addr, connect_id, header.data, now);
        self.peers[index].last_recv = now;
        self.send_control(index, WireHeader::KIND_ACCEPT, header.data, &connect_id.to_le_bytes());
        self.events.push_back(TransportEvent {
            kind: TransportEventKind::Connect,
            peer: PeerId(index as u16),
            channel: 0,
            data: header.data,
            packet: None,
        });
    }

    fn on_accept(&mut self, header: &WireHeader, addr: SocketAddr) {
        let Some(index) = self.find_peer(addr) else {
            return;
        };
        if self.peers[index].state != SlotState::Connecting {
            return;
        }
        self.peers[index].state = SlotState::Connected;
        self.peers[index].last_recv = Instant::now();
        self.events.push_back(TransportEvent {
            kind: TransportEventKind::Connect,
            peer: PeerId(index as u16),
            channel: 0,
            data: header.data,
            packet: None,
        });
    }

    fn on_remote_disconnect(&mut self, header: &WireHeader, addr: SocketAddr) {
        let Some(index) = self.find_peer(addr) else {
            return;
        };
        self.peers[index].release(Instant::now());
        self.events.push_back(TransportEvent {
            kind: TransportEventKind::Disconnect,
            peer: PeerId(index as u16),
            channel: 0,
            data: header.data,
            packet: None,
        });
    }

    fn on_ack(&mut self, header: &WireHeader, addr: SocketAddr) {
        let Some(index) = self.find_peer(addr) else {
            return;
        };
        let peer = &mut self.peers[index];
        peer.last_recv = Instant::now();
        peer.pending
            .retain(|pending| !(pending.channel == header.channel && pending.sequence == header.sequence));
    }

    fn on_data(&mut self, header: &WireHeader, payload: &[u8], addr: SocketAddr) {
        let Some(index) = self.find_peer(addr) else {
            return;
        };
        if self.peers[index].state != SlotState::Connected || header.channel >= self.channels {
            return;
        }
        self.peers[index].last_recv = Instant::now();
        let flags = PacketFlags::from_bits(header.flags);

        if flags.contains(PacketFlags::RELIABLE) {
            let ack = WireHeader {
                kind: WireHeader::KIND_ACK,
                channel: header.channel,
                sequence: header.sequence,
                ..WireHeader::default()
            };
            let datagram = encode_datagram(&ack, &[]);
            self.send_raw(index, &datagram);

            if !self.peers[index].mark_seen(header.channel, header.sequence) {
                return;
            }
        } else if flags.contains(PacketFlags::SEQUENCED)
            && !self.peers[index].accept_sequenced(header.channel, header.sequence)
        {
            return;
        }

        if header.fragment_count > 1 {
            self.on_fragment(index, header, payload);
        } else {
            self.events.push_back(TransportEvent {
                kind: TransportEventKind::Receive,
                peer: PeerId(index as u16),
                channel: header.channel,
                data: 0,
                packet: Some(Packet::new(flags, payload.to_vec())),
            });
        }
    }

    fn on_fragment(&mut self, index: usize, header: &WireHeader, payload: &[u8]) {
        let key = (header.channel, header.sequence);
        let total = header.fragment_count as usize;
        let part = header.fragment_index as usize;
        if part >= total {
            return;
        }

        let peer = &mut self.peers[index];
        let assembly = peer.reassembly.entry(key).or_insert_with(|| Reassembly {
            flags: header.flags,
            parts: (0..total).map(|_| None).collect(),
            received: 0,
        });
        if assembly.parts.len() != total || assembly.parts[part].is_some() {
            return;
        }
        assembly.parts[part] = Some(payload.to_vec());
        assembly.received += 1;

        if assembly.received == total {
            let assembly = peer.reassembly.remove(&key).expect("assembly exists");
            let mut message = Vec::new();
            for part in assembly.parts {
                message.extend_from_slice(&part.expect("all fragments received"));
            }
            self.events.push_back(TransportEvent {
                kind: TransportEventKind::Receive,
                peer: PeerId(index as u16),
                channel: header.channel,
                data: 0,
                packet: Some(Packet::new(PacketFlags::from_bits(assembly.flags), message)),
            });
        }
    }

    fn run_timers(&mut self) {
        let now = Instant::now();
        for index in 0..self.peers.len() {
            match self.peers[index].state {
                SlotState::Free => continue,
                SlotState::Connecting => self.drive_connecting(index, now),
                SlotState::Connected => self.drive_connected(index, now),
            }
        }
    }

    fn drive_connecting(&mut self, index: usize, now: Instant) {
        if now.duration_since(self.peers[index].last_send) < CONNECT_INTERVAL {
            return;
        }
        if self.peers[index].connect_attempts >= MAX_CONNECT_ATTEMPTS {
            self.peers[index].release(now);
            self.events.push_back(TransportEvent {
                kind: TransportEventKind::DisconnectTimeout,
                peer: PeerId(index as u16),
                channel: 0,
                data: 0,
                packet: None,
            });
            return;
        }
        self.peers[index].connect_attempts += 1;
        let connect_id = self.peers[index].connect_id;
        let data = self.peers[index].connect_data;
        self.send_control(index, WireHeader::KIND_CONNECT, data, &connect_id.to_le_bytes());
    }

    fn drive_connected(&mut self, index: usize, now: Instant) {
        // Idle timeout.
        if now.duration_since(self.peers[index].last_recv) > IDLE_TIMEOUT {
            self.peers[index].release(now);
            self.events.push_back(TransportEvent {
                kind: TransportEventKind::DisconnectTimeout,
                peer: PeerId(index as u16),
                channel: 0,
                data: 0,
                packet: None,
            });
            return;
        }

        // Resend unacked reliable datagrams.
        let mut gave_up = false;
        let mut resends: Vec<Vec<u8>> = Vec::new();
        {
            let peer = &mut self.peers[index];
            for pending in &mut peer.pending {
                if now.duration_since(pending.sent_at) >= RESEND_INTERVAL {
                    if pending.resends >= MAX_RESENDS {
                        gave_up = true;
                        break;
                    }
                    pending.sent_at = now;
                    pending.resends += 1;
                    resends.push(pending.datagram.clone());
                }
            }
        }
        if gave_up {
            self.peers[index].release(now);
            self.events.push_back(TransportEvent {
                kind: TransportEventKind::DisconnectTimeout,
                peer: PeerId(index as u16),
                channel: 0,
                data: 0,
                packet: None,
            });
            return;
        }
        for datagram in resends {
            self.send_raw(index, &datagram);
        }

        // Pending graceful disconnect.
        if let Some((style, data)) = self.peers[index].disconnect {
            let drained = match style {
                DisconnectStyle::Later => self.peers[index].pending.is_empty(),
                DisconnectStyle::Update => true,
            };
            if drained {
                self.finish_disconnect(index, data);
                return;
            }
        }

        // Keepalive.
        if now.duration_since(self.peers[index].last_send) >= KEEPALIVE_INTERVAL {
            self.send_control(index, WireHeader::KIND_PING, 0, &[]);
        }
    }

    /// Sends the disconnect notification, emits the local event and
    /// frees the slot.
    fn finish_disconnect(&mut self, index: usize, data: u32) {
        self.send_control(index, WireHeader::KIND_DISCONNECT, data, &[]);
        self.peers[index].release(Instant::now());
        self.events.push_back(TransportEvent {
            kind: TransportEventKind::Disconnect,
            peer: PeerId(index as u16),
            channel: 0,
            data,
            packet: None,
        });
    }

    fn send_fragments(&mut self, index: usize, channel: u8, flags: PacketFlags, payload: &[u8]) -> bool {
        let count = payload.len().div_ceil(MAX_PAYLOAD);
        if count > usize::from(u8::MAX) {
            tracing::warn!(size = payload.len(), "payload too large to fragment");
            return false;
        }
        let sequence = self.peers[index].next_sequence(channel);
        for (part, chunk) in payload.chunks(MAX_PAYLOAD).enumerate() {
            let header = WireHeader {
                kind: WireHeader::KIND_DATA,
                flags: flags.bits(),
                channel,
                fragment_count: count as u8,
                sequence,
                fragment_index: part as u16,
                data: 0,
            };
            let datagram = encode_datagram(&header, chunk);
            if !self.send_raw(index, &datagram) {
                return false;
            }
        }
        true
    }
}

impl Host for UdpHost {
    fn peer_count(&self) -> u16 {
        self.peers.len() as u16
    }

    fn channel_count(&self) -> u8 {
        self.channels
    }

    fn check_events(&mut self) -> Option<TransportEvent> {
        self.pump();
        self.events.pop_front()
    }

    fn service(&mut self, timeout_ms: u32) -> Option<TransportEvent> {
        let deadline = Instant::now() + Duration::from_millis(u64::from(timeout_ms));
        loop {
            if let Some(event) = self.check_events() {
                return Some(event);
            }
            if Instant::now() >= deadline {
                return None;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn connect(&mut self, remote: SocketAddr, data: u32) -> NetworkResult<PeerId> {
        let index = self.free_slot().ok_or(NetworkError::PeersExhausted)?;
        let connect_id = (u32::from(self.local_addr.port()) << 16) ^ self.next_connect_id;
        self.next_connect_id = self.next_connect_id.wrapping_add(1);

        let now = Instant::now();
        self.peers[index].claim(SlotState::Connecting, remote, connect_id, data, now);
        self.peers[index].connect_attempts = 1;
        self.send_control(index, WireHeader::KIND_CONNECT, data, &connect_id.to_le_bytes());
        Ok(PeerId(index as u16))
    }

    fn send(&mut self, peer: PeerId, channel: u8, packet: Packet) -> bool {
        let index = peer.0 as usize;
        if index >= self.peers.len()
            || self.peers[index].state != SlotState::Connected
            || channel >= self.channels
        {
            return false;
        }

        let flags = packet.flags;
        if flags.contains(PacketFlags::FRAGMENTED) && packet.payload.len() > MAX_PAYLOAD {
            return self.send_fragments(index, channel, flags, &packet.payload);
        }
        if packet.payload.len() > MAX_PAYLOAD {
            tracing::warn!(size = packet.payload.len(), "payload exceeds datagram budget");
            return false;
        }

        let sequence = self.peers[index].next_sequence(channel);
        let header = WireHeader {
            kind: WireHeader::KIND_DATA,
            flags: flags.bits(),
            channel,
            fragment_count: 1,
            sequence,
            fragment_index: 0,
            data: 0,
        };
        let datagram = encode_datagram(&header, &packet.payload);
        let sent = self.send_raw(index, &datagram);

        if sent && flags.contains(PacketFlags::RELIABLE) {
            self.peers[index].pending.push(PendingReliable {
                channel,
                sequence,
                datagram,
                sent_at: Instant::now(),
                resends: 0,
            });
        }
        sent
    }

    fn broadcast(&mut self, channel: u8, packet: Packet) {
        for index in 0..self.peers.len() {
            if self.peers[index].state == SlotState::Connected {
                self.send(PeerId(index as u16), channel, packet.clone());
            }
        }
    }

    fn disconnect_later(&mut self, peer: PeerId, data: u32) {
        if let Some(slot) = self.peers.get_mut(peer.0 as usize) {
            if slot.state == SlotState::Connected {
                slot.disconnect = Some((DisconnectStyle::Later, data));
            }
        }
    }

    fn disconnect(&mut self, peer: PeerId, data: u32) {
        if let Some(slot) = self.peers.get_mut(peer.0 as usize) {
            if slot.state == SlotState::Connected {
                slot.disconnect = Some((DisconnectStyle::Update, data));
            }
        }
    }

    fn disconnect_now(&mut self, peer: PeerId, data: u32) {
        let index = peer.0 as usize;
        if index >= self.peers.len() || self.peers[index].state != SlotState::Connected {
            return;
        }
        // Push whatever is still unacked onto the wire once more.
        let unsent: Vec<Vec<u8>> = self.peers[index]
            .pending
            .iter()
            .map(|pending| pending.datagram.clone())
            .collect();
        for datagram in unsent {
            self.send_raw(index, &datagram);
        }
        self.finish_disconnect(index, data);
    }

    fn reset(&mut self, peer: PeerId) {
        if let Some(slot) = self.peers.get_mut(peer.0 as usize) {
            slot.release(Instant::now());
        }
    }

    fn flush(&mut self) {
        for index in 0..self.peers.len() {
            if self.peers[index].state != SlotState::Connected {
                continue;
            }
            let unacked: Vec<Vec<u8>> = self.peers[index]
                .pending
                .iter()
                .map(|pending| pending.datagram.clone())
                .collect();
            for datagram in unacked {
                self.send_raw(index, &datagram);
            }
        }
    }

    fn connect_id(&self, peer: PeerId) -> u32 {
        self.peers
            .get(peer.0 as usize)
            .map_or(0, |slot| slot.connect_id)
    }

    fn is_connected(&self, peer: PeerId) -> bool {
        self.peers
            .get(peer.0 as usize)
            .is_some_and(|slot| slot.state == SlotState::Connected)
    }
}
