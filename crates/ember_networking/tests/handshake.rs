//! Session-layer state machine coverage over the deterministic loopback
//! transport: handshake success and failure modes, disconnect modes and
//! stale-handle semantics.

use std::net::SocketAddr;

use ember_networking::transport::memory::MemoryHost;
use ember_networking::{
    scramble, Connection, DisconnectMode, Host, MessageKind, NetworkManager, NetworkOutput,
    Packet, PeerState, SessionEventKind, TransportEventKind,
};

fn any_addr() -> SocketAddr {
    "127.0.0.1:0".parse().expect("valid address")
}

/// Runs `passes` service rounds at `now`, appending every record.
fn pump(manager: &mut NetworkManager, now: i64, passes: u32, out: &mut Vec<NetworkOutput>) {
    for _ in 0..passes {
        out.extend(manager.service_all(now));
    }
}

fn connect_events(outputs: &[NetworkOutput]) -> Vec<Connection> {
    outputs
        .iter()
        .filter_map(|output| match output {
            NetworkOutput::Event(event) if event.kind == SessionEventKind::Connect => {
                Some(event.connection)
            }
            _ => None,
        })
        .collect()
}

/// Builds a manager with one server network and one client network
/// wired over a loopback pair, and completes the handshake.
fn connected_pair() -> (NetworkManager, u16, u16, Connection) {
    let mut manager = NetworkManager::new();
    let server_id = manager.create_network();
    let client_id = manager.create_network();

    let (server_host, client_host) = MemoryHost::pair(8, 1, 2);
    manager
        .network_mut(server_id)
        .expect("server network")
        .create_server_with(Box::new(server_host))
        .expect("fresh network");
    let connection = manager
        .network_mut(client_id)
        .expect("client network")
        .create_client_with(Box::new(client_host), any_addr(), 0)
        .expect("fresh network");

    let mut outputs = Vec::new();
    pump(&mut manager, 100, 3, &mut outputs);

    let connects = connect_events(&outputs);
    assert_eq!(connects.len(), 2, "both sides observe Connect");
    (manager, server_id, client_id, connection)
}

#[test]
fn scramble_round_trip_literal() {
    assert_eq!(scramble(scramble(0x0123_4567_89ab_cdef)), 0x0123_4567_89ab_cdef);
}

#[test]
fn handshake_success_connects_both_sides() {
    let (manager, server_id, client_id, connection) = connected_pair();

    assert_eq!(manager.state_of(&connection), PeerState::Connected);
    assert!(manager.connection_valid(&connection));

    // Every non-free peer slot on both networks ended Connected.
    for id in [server_id, client_id] {
        let network = manager.network(id).expect("network exists");
        let mut states = Vec::new();
        network.each(|handle| states.push(network.state_of(&handle)));
        assert!(states.contains(&PeerState::Connected));
        assert!(!states.contains(&PeerState::Handshake));
    }
}

#[test]
fn messages_flow_after_handshake() {
    let (mut manager, server_id, _client_id, connection) = connected_pair();

    manager.send(&connection, MessageKind::Reliable, 1, b"hello");

    let mut outputs = Vec::new();
    pump(&mut manager, 101, 2, &mut outputs);

    let messages: Vec<_> = outputs
        .iter()
        .filter_map(|output| match output {
            NetworkOutput::Message(message) => Some(message),
            _ => None,
        })
        .collect();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].data, b"hello");
    assert_eq!(messages[0].kind, MessageKind::Reliable);
    assert_eq!(messages[0].channel, 1);
    assert_eq!(messages[0].connection.network_id(), server_id);
}

#[test]
fn broadcast_reaches_connected_peers() {
    let (mut manager, server_id, client_id, _connection) = connected_pair();

    manager
        .network_mut(server_id)
        .expect("server network")
        .broadcast(MessageKind::Reliable, 0, b"all-hands");

    let mut outputs = Vec::new();
    pump(&mut manager, 101, 2, &mut outputs);

    let received: Vec<_> = outputs
        .iter()
        .filter_map(|output| match output {
            NetworkOutput::Message(message)
                if message.connection.network_id() == client_id =>
            {
                Some(message.data.clone())
            }
            _ => None,
        })
        .collect();
    assert_eq!(received, vec![b"all-hands".to_vec()]);
}

#[test]
fn handshake_timeout_resets_silently() {
    let mut manager = NetworkManager::new();
    let server_id = manager.create_network();

    let (server_host, mut raw_client) = MemoryHost::pair(8, 1, 2);
    manager
        .network_mut(server_id)
        .expect("server network")
        .create_server_with(Box::new(server_host))
        .expect("fresh network");

    // Transport-level connect from a client that never answers the
    // handshake.
    raw_client.connect(any_addr(), 0).expect("free slot");

    let mut outputs = Vec::new();
    pump(&mut manager, 100, 2, &mut outputs);
    // Drain the client's transport events; ignore the challenge.
    while raw_client.check_events().is_some() {}

    // Before the deadline the peer still sits in Handshake.
    pump(&mut manager, 101, 1, &mut outputs);
    let network = manager.network(server_id).expect("network exists");
    let mut states = Vec::new();
    network.each(|handle| states.push(network.state_of(&handle)));
    assert!(states.contains(&PeerState::Handshake));

    // Two seconds after the connect, the queue head expires.
    pump(&mut manager, 102, 1, &mut outputs);
    let network = manager.network(server_id).expect("network exists");
    let mut states = Vec::new();
    network.each(|handle| states.push(network.state_of(&handle)));
    assert!(!states.contains(&PeerState::Handshake));

    assert!(connect_events(&outputs).is_empty(), "no Connect was emitted");
}

#[test]
fn malformed_handshake_payload_resets() {
    let mut manager = NetworkManager::new();
    let server_id = manager.create_network();

    let (server_host, mut raw_client) = MemoryHost::pair(8, 1, 2);
    manager
        .network_mut(server_id)
        .expect("server network")
        .create_server_with(Box::new(server_host))
        .expect("fresh network");

    let peer = raw_client.connect(any_addr(), 0).expect("free slot");

    let mut outputs = Vec::new();
    pump(&mut manager, 100, 2, &mut outputs);
    while raw_client.check_events().is_some() {}

    // Echo garbage of the wrong length on the handshake channel.
    assert!(raw_client.send(peer, 0, Packet::reliable(vec![1, 2, 3])));
    pump(&mut manager, 100, 2, &mut outputs);

    let network = manager.network(server_id).expect("network exists");
    let mut states = Vec::new();
    network.each(|handle| states.push(network.state_of(&handle)));
    assert!(!states.contains(&PeerState::Handshake));
    assert!(connect_events(&outputs).is_empty());
}

#[test]
fn wrong_handshake_key_resets() {
    let mut manager = NetworkManager::new();
    let server_id = manager.create_network();

    let (server_host, mut raw_client) = MemoryHost::pair(8, 1, 2);
    manager
        .network_mut(server_id)
        .expect("server network")
        .create_server_with(Box::new(server_host))
        .expect("fresh network");

    let peer = raw_client.connect(any_addr(), 0).expect("free slot");

    let mut outputs = Vec::new();
    pump(&mut manager, 100, 2, &mut outputs);
    while raw_client.check_events().is_some() {}

    // A well-formed payload with the wrong key.
    let bogus = scramble(0x5555_5555_5555_5555).to_le_bytes();
    assert!(raw_client.send(peer, 0, Packet::reliable(bogus.to_vec())));
    pump(&mut manager, 100, 2, &mut outputs);

    assert!(connect_events(&outputs).is_empty());
}

#[test]
fn default_disconnect_emits_events_on_both_sides() {
    let (mut manager, _server_id, _client_id, connection) = connected_pair();

    manager.disconnect(&connection, DisconnectMode::Default, 9);
    assert_eq!(manager.state_of(&connection), PeerState::Disconnecting);

    let mut outputs = Vec::new();
    pump(&mut manager, 101, 2, &mut outputs);

    let disconnects: Vec<_> = outputs
        .iter()
        .filter_map(|output| match output {
            NetworkOutput::Event(event) if event.kind == SessionEventKind::Disconnect => {
                Some(event.data)
            }
            _ => None,
        })
        .collect();
    assert_eq!(disconnects, vec![9, 9], "both ends observe the disconnect");
    assert_eq!(manager.state_of(&connection), PeerState::Disconnected);
}

#[test]
fn force_disconnect_is_immediate_and_silent() {
    let (mut manager, _server_id, _client_id, connection) = connected_pair();

    manager.disconnect(&connection, DisconnectMode::Force, 0);
    assert_eq!(manager.state_of(&connection), PeerState::Disconnected);

    let mut outputs = Vec::new();
    pump(&mut manager, 101, 2, &mut outputs);

    let local_events = outputs.iter().any(|output| {
        matches!(output, NetworkOutput::Event(event)
            if event.connection.network_id() == connection.network_id())
    });
    assert!(!local_events, "force bypasses notification");

    // Disconnecting again is a no-op.
    manager.disconnect(&connection, DisconnectMode::Default, 0);
    assert_eq!(manager.state_of(&connection), PeerState::Disconnected);
}

#[test]
fn stale_handles_are_no_ops() {
    let (mut manager, _server_id, client_id, connection) = connected_pair();

    manager.disconnect(&connection, DisconnectMode::Force, 0);

    // Reconnecting reuses the freed slot and bumps its sequence, so the
    // old handle goes stale even while the slot is live again. The host
    // argument is ignored because the network already adopted one.
    let renewed = {
        let network = manager.network_mut(client_id).expect("client network");
        network
            .create_client_with(Box::new(MemoryHost::pair(1, 1, 2).1), any_addr(), 0)
            .expect("slot reconnects on the adopted host")
    };

    assert_ne!(renewed.sequence(), connection.sequence());
    assert!(!manager.connection_valid(&connection));
    assert_eq!(manager.state_of(&connection), PeerState::Disconnected);

    // All operations through the stale handle are silent no-ops.
    manager.send(&connection, MessageKind::Reliable, 0, b"ghost");
    manager.disconnect(&connection, DisconnectMode::Default, 0);
    let network = manager.network(client_id).expect("client network");
    assert!(network.peer_data::<u32>(&connection).is_none());
}

#[test]
fn peer_user_data_downcasts() {
    let (mut manager, _server_id, client_id, connection) = connected_pair();

    #[derive(Debug, PartialEq)]
    struct PlayerTag(&'static str);

    {
        let network = manager.network_mut(client_id).expect("client network");
        network.set_peer_data(&connection, Box::new(PlayerTag("ember")));
    }
    let network = manager.network(client_id).expect("client network");
    assert_eq!(
        network.peer_data::<PlayerTag>(&connection),
        Some(&PlayerTag("ember"))
    );
    // Wrong-type downcasts yield None rather than corrupt data.
    assert!(network.peer_data::<u32>(&connection).is_none());
}

#[test]
fn shutdown_invalidates_network() {
    let (mut manager, server_id, _client_id, _connection) = connected_pair();

    let network = manager.network_mut(server_id).expect("server network");
    assert!(network.valid());
    network.shutdown();
    assert!(!network.valid());
    assert!(!network.server());

    // Broadcast on an invalid network is ignored.
    network.broadcast(MessageKind::Reliable, 0, b"nobody");
}

#[test]
fn raw_transport_events_match_contract() {
    // The loopback transport honors the same event contract the session
    // layer relies on.
    let (mut server, mut client) = MemoryHost::pair(2, 1, 1);
    let peer = client.connect(any_addr(), 123).expect("free slot");

    let event = server.check_events().expect("connect event");
    assert_eq!(event.kind, TransportEventKind::Connect);
    assert_eq!(event.data, 123);

    let accept = client.check_events().expect("accept event");
    assert_eq!(accept.kind, TransportEventKind::Connect);
    assert_eq!(accept.peer, peer);
}
