//! End-to-end session-layer runs over real localhost UDP: connect,
//! handshake, reliable delivery, broadcast and orderly disconnect.

use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ember_networking::transport::udp::UdpHost;
use ember_networking::{
    Connection, DisconnectMode, MessageKind, NetworkManager, NetworkOutput, PeerState,
    SessionEventKind,
};

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch")
        .as_secs() as i64
}

/// Pumps the manager until `done` returns true or the deadline passes.
fn pump_until(
    manager: &mut NetworkManager,
    outputs: &mut Vec<NetworkOutput>,
    mut done: impl FnMut(&[NetworkOutput]) -> bool,
) -> bool {
    for _ in 0..600 {
        outputs.extend(manager.service_all(now_secs()));
        if done(outputs) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

fn count_connects(outputs: &[NetworkOutput]) -> usize {
    outputs
        .iter()
        .filter(|output| {
            matches!(output, NetworkOutput::Event(event)
                if event.kind == SessionEventKind::Connect)
        })
        .count()
}

/// One server network plus `clients` client networks over localhost.
fn udp_session(clients: usize) -> (NetworkManager, u16, Vec<(u16, Connection)>) {
    let mut manager = NetworkManager::new();
    let server_id = manager.create_network();

    let server_host =
        UdpHost::server("127.0.0.1:0".parse().expect("valid address"), 8, 2).expect("bind");
    let server_addr = SocketAddr::from(([127, 0, 0, 1], server_host.local_addr().port()));
    manager
        .network_mut(server_id)
        .expect("server network")
        .create_server_with(Box::new(server_host))
        .expect("fresh network");

    let mut handles = Vec::new();
    for _ in 0..clients {
        let client_id = manager.create_network();
        let client_host = UdpHost::client(1, 2).expect("bind");
        let connection = manager
            .network_mut(client_id)
            .expect("client network")
            .create_client_with(Box::new(client_host), server_addr, 0)
            .expect("fresh network");
        handles.push((client_id, connection));
    }

    let mut outputs = Vec::new();
    let expected = clients * 2;
    assert!(
        pump_until(&mut manager, &mut outputs, |seen| count_connects(seen)
            >= expected),
        "handshake did not complete over localhost UDP"
    );

    for (_, connection) in &handles {
        assert_eq!(manager.state_of(connection), PeerState::Connected);
    }
    (manager, server_id, handles)
}

#[test]
fn udp_handshake_and_reliable_delivery() {
    let (mut manager, server_id, handles) = udp_session(1);
    let (_, connection) = handles[0];

    manager.send(&connection, MessageKind::Reliable, 1, b"over-the-wire");

    let mut outputs = Vec::new();
    let delivered = pump_until(&mut manager, &mut outputs, |seen| {
        seen.iter().any(|output| {
            matches!(output, NetworkOutput::Message(message)
                if message.connection.network_id() == server_id
                    && message.data == b"over-the-wire"
                    && message.channel == 1
                    && message.kind == MessageKind::Reliable)
        })
    });
    assert!(delivered, "reliable message did not arrive");
}

#[test]
fn udp_broadcast_reaches_every_client() {
    let (mut manager, server_id, handles) = udp_session(2);

    manager
        .network_mut(server_id)
        .expect("server network")
        .broadcast(MessageKind::Reliable, 0, b"tick");

    let client_ids: Vec<u16> = handles.iter().map(|(id, _)| *id).collect();
    let mut outputs = Vec::new();
    let all_received = pump_until(&mut manager, &mut outputs, |seen| {
        client_ids.iter().all(|&client_id| {
            seen.iter().any(|output| {
                matches!(output, NetworkOutput::Message(message)
                    if message.connection.network_id() == client_id
                        && message.data == b"tick")
            })
        })
    });
    assert!(all_received, "broadcast missed a client");
}

#[test]
fn udp_orderly_disconnect_round_trip() {
    let (mut manager, server_id, handles) = udp_session(1);
    let (client_id, connection) = handles[0];

    manager.disconnect(&connection, DisconnectMode::Default, 4);

    let mut outputs = Vec::new();
    let both_sides = pump_until(&mut manager, &mut outputs, |seen| {
        let seen_on = |network: u16| {
            seen.iter().any(|output| {
                matches!(output, NetworkOutput::Event(event)
                    if event.kind == SessionEventKind::Disconnect
                        && event.connection.network_id() == network
                        && event.data == 4)
            })
        };
        seen_on(client_id) && seen_on(server_id)
    });
    assert!(both_sides, "disconnect was not observed on both ends");
    assert_eq!(manager.state_of(&connection), PeerState::Disconnected);
}
