//! # Virtual Network
//!
//! One host (server listener or client initiator), its peer sessions and
//! its handshake queue.
//!
//! The service loop runs once per tick: it drains a bounded number of
//! transport events, advances the per-peer state machines and collects
//! [`NetworkOutput`] records for the manager to emit on the engine bus.

use std::any::Any;
use std::net::SocketAddr;

use crate::config::NetworkConfig;
use crate::connection::Connection;
use crate::error::{NetworkError, NetworkResult};
use crate::events::{InboundMessage, NetworkOutput, PeerEvent};
use crate::handshake::{self, HandshakeQueue, HANDSHAKE_TIMEOUT_SECS};
use crate::session::{DisconnectMode, MessageKind, PeerSession, PeerState, SessionEventKind};
use crate::transport::udp::UdpHost;
use crate::transport::{Host, Packet, PeerId, TransportEvent, TransportEventKind};

/// The reliable channel the handshake runs on.
const HANDSHAKE_CHANNEL: u8 = 0;

/// A virtual network: one transport host plus its peer sessions.
pub struct Network {
    id: u16,
    host: Option<Box<dyn Host>>,
    sessions: Vec<PeerSession>,
    handshake_queue: HandshakeQueue,
    user_data: Option<Box<dyn Any>>,
    server: bool,
}

impl Network {
    pub(crate) fn new(id: u16) -> Self {
        Self {
            id,
            host: None,
            sessions: Vec::new(),
            handshake_queue: HandshakeQueue::default(),
            user_data: None,
            server: false,
        }
    }

    /// This network's id within its manager.
    #[must_use]
    pub fn id(&self) -> u16 {
        self.id
    }

    /// True if the host was created as a server.
    #[must_use]
    pub fn server(&self) -> bool {
        self.server
    }

    /// True if the network currently holds a host.
    #[must_use]
    pub fn valid(&self) -> bool {
        self.host.is_some()
    }

    /// Binds a UDP server host per `config`.
    ///
    /// # Errors
    ///
    /// [`NetworkError::AlreadyInUse`] if a host exists,
    /// [`NetworkError::AddressResolve`] / [`NetworkError::HostCreate`]
    /// when the bind fails.
    pub fn create_server(&mut self, config: &NetworkConfig) -> NetworkResult<()> {
        if self.host.is_some() {
            return Err(NetworkError::AlreadyInUse);
        }
        let address = config.resolve()?;
        let host = UdpHost::server(address, config.peers, config.channels)?;
        self.adopt_host(Box::new(host), true);
        tracing::info!(network = self.id, %address, "server host created");
        Ok(())
    }

    /// Adopts a caller-supplied server host (custom transports, tests).
    ///
    /// # Errors
    ///
    /// [`NetworkError::AlreadyInUse`] if a host exists.
    pub fn create_server_with(&mut self, host: Box<dyn Host>) -> NetworkResult<()> {
        if self.host.is_some() {
            return Err(NetworkError::AlreadyInUse);
        }
        self.adopt_host(host, true);
        Ok(())
    }

    /// Creates (if absent) a UDP client host and initiates a connection
    /// to `config.address:config.port` on one peer slot.
    ///
    /// # Errors
    ///
    /// [`NetworkError::AlreadyInUse`] if this network is a server,
    /// resolution/bind errors, or [`NetworkError::PeersExhausted`].
    pub fn create_client(&mut self, config: &NetworkConfig) -> NetworkResult<Connection> {
        if self.server {
            return Err(NetworkError::AlreadyInUse);
        }
        if self.host.is_none() {
            let host = UdpHost::client(config.peers, config.channels)?;
            self.adopt_host(Box::new(host), false);
        }
        let remote = config.resolve()?;
        self.initiate(remote, config.data)
    }

    /// Adopts a caller-supplied client host (if absent) and connects.
    ///
    /// # Errors
    ///
    /// Same as [`Network::create_client`].
    pub fn create_client_with(
        &mut self,
        host: Box<dyn Host>,
        remote: SocketAddr,
        data: u32,
    ) -> NetworkResult<Connection> {
        if self.server {
            return Err(NetworkError::AlreadyInUse);
        }
        if self.host.is_none() {
            self.adopt_host(host, false);
        }
        self.initiate(remote, data)
    }

    fn adopt_host(&mut self, host: Box<dyn Host>, server: bool) {
        // One session per transport peer slot, wired 1:1 by index.
        self.sessions = (0..host.peer_count()).map(|_| PeerSession::new()).collect();
        self.handshake_queue.clear();
        self.server = server;
        self.host = Some(host);
    }

    fn initiate(&mut self, remote: SocketAddr, data: u32) -> NetworkResult<Connection> {
        let host = self.host.as_mut().expect("client host exists");
        let peer = host.connect(remote, data)?;
        let session = &mut self.sessions[peer.0 as usize];
        session.reuse(PeerState::Connecting);
        tracing::info!(network = self.id, %remote, peer = peer.0, "connecting");
        Ok(Connection::new(self.id, peer, session.sequence))
    }

    /// Flushes pending outbound and releases the host and sessions.
    pub fn shutdown(&mut self) {
        if let Some(mut host) = self.host.take() {
            host.flush();
            tracing::info!(network = self.id, "network shut down");
        }
        self.sessions.clear();
        self.handshake_queue.clear();
        self.server = false;
    }

    /// Sends to every connected peer. Ignored if the host is not valid.
    pub fn broadcast(&mut self, kind: MessageKind, channel: u8, payload: &[u8]) {
        let Some(host) = self.host.as_mut() else {
            return;
        };
        let flags = kind.to_flags();
        for (index, session) in self.sessions.iter().enumerate() {
            if session.state == PeerState::Connected {
                host.send(
                    PeerId(index as u16),
                    channel,
                    Packet::new(flags, payload.to_vec()),
                );
            }
        }
    }

    /// Enumerates every peer slot as a transient [`Connection`].
    /// Callers must re-check validity before acting on one.
    pub fn each(&self, mut f: impl FnMut(Connection)) {
        for (index, session) in self.sessions.iter().enumerate() {
            f(Connection::new(self.id, PeerId(index as u16), session.sequence));
        }
    }

    /// Attaches opaque user data to the network itself.
    pub fn set_user_data(&mut self, data: Box<dyn Any>) {
        self.user_data = Some(data);
    }

    /// Downcasts the network's user data.
    #[must_use]
    pub fn user_data<T: 'static>(&self) -> Option<&T> {
        self.user_data.as_ref()?.downcast_ref::<T>()
    }

    /// Downcasts the network's user data mutably.
    pub fn user_data_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.user_data.as_mut()?.downcast_mut::<T>()
    }

    // =========================================================================
    // Connection-resolved operations
    // =========================================================================

    /// True if `connection` still names the current occupant of its
    /// slot on a valid host.
    #[must_use]
    pub fn connection_valid(&self, connection: &Connection) -> bool {
        self.handle_matches(connection)
            && self.sessions[connection.peer().0 as usize].state != PeerState::Disconnected
    }

    /// State of the referenced peer, [`PeerState::Disconnected`] for
    /// stale handles.
    #[must_use]
    pub fn state_of(&self, connection: &Connection) -> PeerState {
        if self.handle_matches(connection) {
            self.sessions[connection.peer().0 as usize].state
        } else {
            PeerState::Disconnected
        }
    }

    /// Sends to the referenced peer. Silent no-op on stale handles or
    /// peers that are not `Connected`.
    pub fn send(&mut self, connection: &Connection, kind: MessageKind, channel: u8, payload: &[u8]) {
        if !self.handle_matches(connection) {
            return;
        }
        let index = connection.peer().0 as usize;
        if self.sessions[index].state != PeerState::Connected {
            return;
        }
        let host = self.host.as_mut().expect("valid handle implies host");
        host.send(
            connection.peer(),
            channel,
            Packet::new(kind.to_flags(), payload.to_vec()),
        );
    }

    /// Disconnects the referenced peer per `mode`. Silent no-op on stale
    /// handles and on peers already `Disconnecting`/`Disconnected`.
    pub fn disconnect(&mut self, connection: &Connection, mode: DisconnectMode, data: u32) {
        if !self.handle_matches(connection) {
            return;
        }
        let index = connection.peer().0 as usize;
        if matches!(
            self.sessions[index].state,
            PeerState::Disconnecting | PeerState::Disconnected
        ) {
            return;
        }

        let peer = connection.peer();
        match mode {
            DisconnectMode::Default => {
                self.sessions[index].state = PeerState::Disconnecting;
                self.host
                    .as_mut()
                    .expect("valid handle implies host")
                    .disconnect_later(peer, data);
            }
            DisconnectMode::Update => {
                self.sessions[index].state = PeerState::Disconnecting;
                self.host
                    .as_mut()
                    .expect("valid handle implies host")
                    .disconnect(peer, data);
            }
            DisconnectMode::Now => {
                self.sessions[index].state = PeerState::Disconnecting;
                self.host
                    .as_mut()
                    .expect("valid handle implies host")
                    .disconnect_now(peer, data);
            }
            DisconnectMode::Force => {
                // Synchronous reset, no notification, no event.
                self.host
                    .as_mut()
                    .expect("valid handle implies host")
                    .reset(peer);
                self.sessions[index].reset();
                self.handshake_queue.remove(peer);
            }
        }
    }

    /// Attaches opaque user data to the referenced peer session. Silent
    /// no-op on stale handles.
    pub fn set_peer_data(&mut self, connection: &Connection, data: Box<dyn Any>) {
        if !self.handle_matches(connection) {
            return;
        }
        self.sessions[connection.peer().0 as usize].user_data = Some(data);
    }

    /// Transport connect-id of the referenced peer, shared by both ends
    /// of the connection. Zero on stale handles.
    #[must_use]
    pub fn connect_id_of(&self, connection: &Connection) -> u32 {
        if !self.handle_matches(connection) {
            return 0;
        }
        self.host
            .as_ref()
            .expect("valid handle implies host")
            .connect_id(connection.peer())
    }

    /// Downcasts the referenced peer's user data. `None` on stale
    /// handles.
    #[must_use]
    pub fn peer_data<T: 'static>(&self, connection: &Connection) -> Option<&T> {
        if !self.handle_matches(connection) {
            return None;
        }
        self.sessions[connection.peer().0 as usize]
            .user_data
            .as_ref()?
            .downcast_ref::<T>()
    }

    fn handle_matches(&self, connection: &Connection) -> bool {
        connection.network_id() == self.id
            && self.host.is_some()
            && (connection.peer().0 as usize) < self.sessions.len()
            && self.sessions[connection.peer().0 as usize].sequence == connection.sequence()
    }

    // =========================================================================
    // Service loop
    // =========================================================================

    /// One service pass: drain up to `events_limit` transport events,
    /// dispatch them, then check the handshake queue head for expiry.
    pub(crate) fn service(
        &mut self,
        now_secs: i64,
        timeout_ms: u32,
        events_limit: u32,
        out: &mut Vec<NetworkOutput>,
    ) {
        if self.host.is_none() {
            return;
        }

        for _ in 0..events_limit {
            let event = {
                let host = self.host.as_mut().expect("host checked above");
                host.check_events().or_else(|| host.service(timeout_ms))
            };
            let Some(event) = event else {
                break;
            };
            self.dispatch(event, now_secs, out);
        }

        self.expire_handshake_head(now_secs);
    }

    fn dispatch(&mut self, event: TransportEvent, now_secs: i64, out: &mut Vec<NetworkOutput>) {
        match event.kind {
            TransportEventKind::Connect => self.on_transport_connect(event.peer, now_secs),
            TransportEventKind::Disconnect => {
                self.on_transport_disconnect(event.peer, event.data, SessionEventKind::Disconnect, out);
            }
            TransportEventKind::DisconnectTimeout => {
                self.on_transport_disconnect(event.peer, event.data, SessionEventKind::Timeout, out);
            }
            TransportEventKind::Receive => {
                if let Some(packet) = event.packet {
                    self.on_receive(event.peer, event.channel, packet, out);
                }
            }
        }
    }

    fn on_transport_connect(&mut self, peer: PeerId, now_secs: i64) {
        let index = peer.0 as usize;
        if self.server {
            // Slot reuse for a new remote bumps the sequence.
            self.sessions[index].reuse(PeerState::Handshake);
            let key = now_secs + HANDSHAKE_TIMEOUT_SECS;
            self.sessions[index].handshake_key = key;

            let sent = self
                .host
                .as_mut()
                .expect("service implies host")
                .send(peer, HANDSHAKE_CHANNEL, Packet::reliable(handshake::encode(key).to_vec()));
            if sent {
                self.handshake_queue.push(peer);
            } else {
                tracing::warn!(network = self.id, peer = peer.0, "handshake send failed");
                self.reset_peer(peer);
            }
        } else {
            // The client slot was claimed (and bumped) at connect time.
            self.sessions[index].state = PeerState::Handshake;
            self.sessions[index].handshake_key = 0;
        }
    }

    fn on_transport_disconnect(
        &mut self,
        peer: PeerId,
        data: u32,
        kind: SessionEventKind,
        out: &mut Vec<NetworkOutput>,
    ) {
        let index = peer.0 as usize;
        if self.sessions[index].state == PeerState::Disconnected {
            return;
        }
        tracing::info!(network = self.id, peer = peer.0, ?kind, "peer disconnected");
        out.push(NetworkOutput::Event(PeerEvent {
            connection: self.connection_at(peer),
            data,
            kind,
        }));
        self.sessions[index].reset();
        self.handshake_queue.remove(peer);
    }

    fn on_receive(
        &mut self,
        peer: PeerId,
        channel: u8,
        packet: Packet,
        out: &mut Vec<NetworkOutput>,
    ) {
        if self.sessions[peer.0 as usize].state == PeerState::Handshake {
            self.on_handshake_payload(peer, &packet.payload, out);
            return;
        }
        out.push(NetworkOutput::Message(InboundMessage {
            connection: self.connection_at(peer),
            kind: MessageKind::from_flags(packet.flags),
            data: packet.payload,
            channel,
        }));
    }

    fn on_handshake_payload(&mut self, peer: PeerId, payload: &[u8], out: &mut Vec<NetworkOutput>) {
        let Some(decrypt) = handshake::decode(payload) else {
            tracing::warn!(
                network = self.id,
                peer = peer.0,
                length = payload.len(),
                "malformed handshake payload"
            );
            self.reset_peer(peer);
            return;
        };

        let connect_id = self
            .host
            .as_ref()
            .expect("service implies host")
            .connect_id(peer);
        let salt = handshake::salt(connect_id);
        let index = peer.0 as usize;

        if self.server {
            let expected = self.sessions[index].handshake_key ^ salt;
            let verified = expected == decrypt
                && self.host.as_mut().expect("service implies host").send(
                    peer,
                    HANDSHAKE_CHANNEL,
                    Packet::reliable(handshake::encode(expected).to_vec()),
                );
            self.handshake_queue.remove(peer);
            if verified {
                self.sessions[index].state = PeerState::Connected;
                tracing::info!(network = self.id, peer = peer.0, "peer connected");
                out.push(NetworkOutput::Event(PeerEvent {
                    connection: self.connection_at(peer),
                    data: 0,
                    kind: SessionEventKind::Connect,
                }));
            } else {
                tracing::warn!(network = self.id, peer = peer.0, "handshake verification failed");
                self.reset_peer(peer);
            }
        } else if self.sessions[index].handshake_key == 0 {
            // First server message: derive our key and echo it.
            let key = decrypt ^ salt;
            self.sessions[index].handshake_key = key;
            let sent = self.host.as_mut().expect("service implies host").send(
                peer,
                HANDSHAKE_CHANNEL,
                Packet::reliable(handshake::encode(key).to_vec()),
            );
            if !sent {
                self.reset_peer(peer);
            }
        } else if self.sessions[index].handshake_key == decrypt {
            self.sessions[index].state = PeerState::Connected;
            tracing::info!(network = self.id, peer = peer.0, "connected to server");
            out.push(NetworkOutput::Event(PeerEvent {
                connection: self.connection_at(peer),
                data: 0,
                kind: SessionEventKind::Connect,
            }));
        } else {
            tracing::warn!(network = self.id, peer = peer.0, "handshake echo mismatch");
            self.reset_peer(peer);
        }
    }

    /// Only the queue head is inspected per tick; FIFO insertion makes
    /// expiry monotonic.
    fn expire_handshake_head(&mut self, now_secs: i64) {
        let Some(head) = self.handshake_queue.front() else {
            return;
        };
        let index = head.0 as usize;
        if self.sessions[index].state != PeerState::Handshake {
            // Stale entry from a completed or reset peer.
            self.handshake_queue.pop();
            return;
        }
        if self.sessions[index].handshake_key <= now_secs {
            self.handshake_queue.pop();
            tracing::warn!(network = self.id, peer = head.0, "handshake timed out");
            self.reset_peer(head);
        }
    }

    fn reset_peer(&mut self, peer: PeerId) {
        if let Some(host) = self.host.as_mut() {
            host.reset(peer);
        }
        self.sessions[peer.0 as usize].reset();
        self.handshake_queue.remove(peer);
    }

    fn connection_at(&self, peer: PeerId) -> Connection {
        Connection::new(self.id, peer, self.sessions[peer.0 as usize].sequence)
    }
}
