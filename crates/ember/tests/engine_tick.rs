//! Tick-driven integration: the network manager services itself from
//! the bus, session records arrive as bus events in drain order, and
//! bus handlers can call back into the manager.

use std::cell::RefCell;
use std::net::SocketAddr;
use std::rc::Rc;

use ember::{Engine, EngineConfig};
use ember_networking::transport::memory::MemoryHost;
use ember_networking::{
    InboundMessage, MessageKind, NetworkManager, PeerEvent, PeerState, SessionEventKind,
};
use ember_shared::Tick;

fn any_addr() -> SocketAddr {
    "127.0.0.1:0".parse().expect("valid address")
}

/// Engine + attached manager with a loopback server/client pair.
fn engine_with_session() -> (Engine, Rc<RefCell<NetworkManager>>, ember_networking::Connection) {
    let engine = Engine::new(&EngineConfig::default());
    let manager = Rc::new(RefCell::new(NetworkManager::new()));
    NetworkManager::attach(&manager, engine.bus());

    let connection = {
        let mut this = manager.borrow_mut();
        let server_id = this.create_network();
        let client_id = this.create_network();

        let (server_host, client_host) = MemoryHost::pair(8, 1, 2);
        this.network_mut(server_id)
            .expect("server network")
            .create_server_with(Box::new(server_host))
            .expect("fresh network");
        this.network_mut(client_id)
            .expect("client network")
            .create_client_with(Box::new(client_host), any_addr(), 0)
            .expect("fresh network")
    };

    (engine, manager, connection)
}

#[test]
fn ticks_drive_the_handshake_to_connected() {
    let (mut engine, manager, connection) = engine_with_session();

    let connects = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&connects);
    engine.bus().subscribe::<PeerEvent>(move |event| {
        if event.kind == SessionEventKind::Connect {
            sink.borrow_mut().push(event.connection.network_id());
        }
    });

    engine.pump(4);

    assert_eq!(connects.borrow().len(), 2, "both sides connected");
    assert_eq!(manager.borrow().state_of(&connection), PeerState::Connected);
}

#[test]
fn message_handlers_can_reply_through_the_manager() {
    let (mut engine, manager, connection) = engine_with_session();
    engine.pump(4);

    // Echo everything that reaches the server back to its sender.
    let echoer = Rc::clone(&manager);
    engine.bus().subscribe::<InboundMessage>(move |message| {
        if message.data != b"pong" {
            echoer
                .borrow_mut()
                .send(&message.connection, MessageKind::Reliable, 0, b"pong");
        }
    });

    let replies = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&replies);
    let client_network = connection.network_id();
    engine.bus().subscribe::<InboundMessage>(move |message| {
        if message.connection.network_id() == client_network {
            sink.borrow_mut().push(message.data.clone());
        }
    });

    manager
        .borrow_mut()
        .send(&connection, MessageKind::Reliable, 0, b"ping");
    engine.pump(4);

    assert_eq!(*replies.borrow(), vec![b"pong".to_vec()]);
}

#[test]
fn dropping_the_manager_unsubscribes_from_ticks() {
    let (mut engine, manager, _connection) = engine_with_session();
    engine.pump(1);

    assert_eq!(engine.bus().handler_count::<Tick>(), 1);
    drop(manager);
    assert_eq!(engine.bus().handler_count::<Tick>(), 0);

    // Ticking without the manager is harmless.
    engine.pump(1);
}

#[test]
fn ecs_lifecycle_events_share_the_engine_bus() {
    use ember_core::{EntityCreated, Registry};

    let engine = Engine::new(&EngineConfig::default());
    let mut world = Registry::with_bus(Rc::clone(engine.bus()));

    let created = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&created);
    engine.bus().subscribe::<EntityCreated>(move |event| {
        sink.borrow_mut().push(event.entity);
    });

    let entity = world.create();
    assert_eq!(*created.borrow(), vec![entity]);
}

#[test]
fn tick_carries_wall_clock_seconds() {
    let mut engine = Engine::new(&EngineConfig::default());
    let seen = Rc::new(RefCell::new(Vec::new()));

    let sink = Rc::clone(&seen);
    engine.bus().subscribe::<Tick>(move |tick| {
        sink.borrow_mut().push(tick.now_secs);
    });

    engine.pump(2);
    let ticks = seen.borrow();
    assert_eq!(ticks.len(), 2);
    // Sane epoch-seconds value, monotonic across the two ticks.
    assert!(ticks[0] > 1_600_000_000);
    assert!(ticks[1] >= ticks[0]);
}
