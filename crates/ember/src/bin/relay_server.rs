//! # Ember Relay Server
//!
//! Minimal engine host: binds a server network and echoes every message
//! back to its sender.
//!
//! ## Usage
//!
//! ```bash
//! relay_server --port 7777 --peers 32 --duration 60
//! ```

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use ember::{Engine, EngineConfig};
use ember_core::Registry;
use ember_networking::{
    Connection, InboundMessage, NetworkConfig, NetworkManager, PeerEvent, SessionEventKind,
};

/// Component attached to the entity mirroring one connected peer.
#[derive(Debug, Clone, Copy)]
struct Remote {
    connection: Connection,
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let mut port = 7777u16;
    let mut peers = 32u16;
    let mut duration_secs = 60u64;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                if i + 1 < args.len() {
                    port = args[i + 1].parse().unwrap_or(7777);
                    i += 1;
                }
            }
            "--peers" | "-n" => {
                if i + 1 < args.len() {
                    peers = args[i + 1].parse().unwrap_or(32);
                    i += 1;
                }
            }
            "--duration" | "-d" => {
                if i + 1 < args.len() {
                    duration_secs = args[i + 1].parse().unwrap_or(60);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Usage: relay_server [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -p, --port <PORT>       UDP port to bind (default: 7777)");
                println!("  -n, --peers <NUM>       Peer slots (default: 32)");
                println!("  -d, --duration <SECS>   Run for N seconds (default: 60)");
                println!("  -h, --help              Show this help");
                return;
            }
            _ => {}
        }
        i += 1;
    }

    println!("ember relay server on 0.0.0.0:{port} ({peers} peers, {duration_secs}s)");

    let mut engine = Engine::new(&EngineConfig::default());
    let manager = Rc::new(RefCell::new(NetworkManager::new()));
    NetworkManager::attach(&manager, engine.bus());

    let network_id = {
        let mut manager = manager.borrow_mut();
        let id = manager.create_network();
        let config = NetworkConfig::new("0.0.0.0", port, peers, 2);
        if let Err(error) = manager
            .network_mut(id)
            .expect("network just created")
            .create_server(&config)
        {
            eprintln!("failed to start server: {error}");
            return;
        }
        id
    };
    engine
        .systems_mut()
        .register::<NetworkManager>(Rc::clone(&manager));

    // Mirror connected peers as entities so gameplay systems can attach
    // components to them.
    let world = Rc::new(RefCell::new(Registry::with_bus(Rc::clone(engine.bus()))));
    engine
        .systems_mut()
        .register::<Registry>(Rc::clone(&world));

    let roster = Rc::clone(&world);
    engine.bus().subscribe::<PeerEvent>(move |event| {
        println!(
            "peer event: {:?} (network {}, data {})",
            event.kind,
            event.connection.network_id(),
            event.data
        );
        let mut world = roster.borrow_mut();
        match event.kind {
            SessionEventKind::Connect => {
                let entity = world.create();
                world.add(
                    entity,
                    Remote {
                        connection: event.connection,
                    },
                );
            }
            SessionEventKind::Disconnect | SessionEventKind::Timeout => {
                let gone: Vec<_> = world
                    .view::<(Remote,)>()
                    .iter()
                    .filter(|(_, (remote,))| remote.connection == event.connection)
                    .map(|(entity, _)| entity)
                    .collect();
                world.destroy_many(gone);
            }
        }
    });

    let relay = Rc::clone(&manager);
    engine.bus().subscribe::<InboundMessage>(move |message| {
        relay
            .borrow_mut()
            .send(&message.connection, message.kind, message.channel, &message.data);
    });

    engine.run_for(Duration::from_secs(duration_secs));

    manager.borrow_mut().remove_network(network_id);
    println!("relay server stopped after {} ticks", engine.tick_count());
}
