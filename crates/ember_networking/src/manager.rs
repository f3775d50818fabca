//! # Network Manager
//!
//! Owns every virtual network, mints their 16-bit ids and services them
//! once per engine tick.
//!
//! Service outputs are collected during the drain and re-emitted on the
//! engine bus after the manager releases its own borrow, preserving
//! drain order while leaving bus handlers free to call back into the
//! manager (send, disconnect, ...).

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use ember_shared::{EventBus, Subscription, Tick};

use crate::connection::Connection;
use crate::events::NetworkOutput;
use crate::network::Network;
use crate::session::{DisconnectMode, MessageKind, PeerState};
use crate::{EVENTS_LIMIT, SERVICE_TIMEOUT_MS};

/// Container and tick driver for all virtual networks.
pub struct NetworkManager {
    networks: Vec<Network>,
    next_id: u16,
    bus: Option<Rc<EventBus>>,
    tick_subscription: Option<Subscription>,
}

impl NetworkManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            networks: Vec::new(),
            next_id: 0,
            bus: None,
            tick_subscription: None,
        }
    }

    /// Creates a fresh virtual network and returns its id.
    pub fn create_network(&mut self) -> u16 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.networks.push(Network::new(id));
        id
    }

    /// Shuts down and removes a network. Unknown ids are ignored.
    pub fn remove_network(&mut self, id: u16) {
        if let Some(position) = self.networks.iter().position(|network| network.id() == id) {
            self.networks[position].shutdown();
            self.networks.remove(position);
        }
    }

    /// Looks a network up by id.
    #[must_use]
    pub fn network(&self, id: u16) -> Option<&Network> {
        self.networks.iter().find(|network| network.id() == id)
    }

    /// Looks a network up by id, mutably.
    pub fn network_mut(&mut self, id: u16) -> Option<&mut Network> {
        self.networks.iter_mut().find(|network| network.id() == id)
    }

    /// Number of networks.
    #[must_use]
    pub fn count(&self) -> usize {
        self.networks.len()
    }

    /// Iterates the networks in enumeration (service) order.
    pub fn iter(&self) -> impl Iterator<Item = &Network> {
        self.networks.iter()
    }

    /// Iterates the networks mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Network> {
        self.networks.iter_mut()
    }

    /// Services every network once, in enumeration order, and returns
    /// the collected records in drain order.
    ///
    /// `now_secs` is the wall-clock seconds used for handshake expiry;
    /// when attached to a bus this comes from [`Tick::now_secs`].
    pub fn service_all(&mut self, now_secs: i64) -> Vec<NetworkOutput> {
        let mut out = Vec::new();
        for network in &mut self.networks {
            network.service(now_secs, SERVICE_TIMEOUT_MS, EVENTS_LIMIT, &mut out);
        }
        out
    }

    /// Subscribes the manager to [`Tick`] on `bus`. Each tick services
    /// every network and re-emits the drained records on the bus. The
    /// subscription is dropped with the manager.
    pub fn attach(manager: &Rc<RefCell<Self>>, bus: &Rc<EventBus>) {
        let weak: Weak<RefCell<Self>> = Rc::downgrade(manager);
        let emitter = Rc::clone(bus);

        let subscription = bus.subscribe::<Tick>(move |tick| {
            let Some(strong) = weak.upgrade() else {
                return;
            };
            let outputs = strong.borrow_mut().service_all(tick.now_secs);
            for output in outputs {
                match output {
                    NetworkOutput::Event(event) => emitter.emit(&event),
                    NetworkOutput::Message(message) => emitter.emit(&message),
                }
            }
        });

        let mut this = manager.borrow_mut();
        this.bus = Some(Rc::clone(bus));
        this.tick_subscription = Some(subscription);
    }

    // =========================================================================
    // Connection-resolved operations
    // =========================================================================

    /// True if the handle still names the current occupant of its slot.
    #[must_use]
    pub fn connection_valid(&self, connection: &Connection) -> bool {
        self.network(connection.network_id())
            .is_some_and(|network| network.connection_valid(connection))
    }

    /// State of the referenced peer; `Disconnected` for stale handles.
    #[must_use]
    pub fn state_of(&self, connection: &Connection) -> PeerState {
        self.network(connection.network_id())
            .map_or(PeerState::Disconnected, |network| network.state_of(connection))
    }

    /// Sends to the referenced peer. Silent no-op on stale handles.
    pub fn send(&mut self, connection: &Connection, kind: MessageKind, channel: u8, payload: &[u8]) {
        if let Some(network) = self.network_mut(connection.network_id()) {
            network.send(connection, kind, channel, payload);
        }
    }

    /// Disconnects the referenced peer. Silent no-op on stale handles.
    pub fn disconnect(&mut self, connection: &Connection, mode: DisconnectMode, data: u32) {
        if let Some(network) = self.network_mut(connection.network_id()) {
            network.disconnect(connection, mode, data);
        }
    }
}

impl Default for NetworkManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for NetworkManager {
    fn drop(&mut self) {
        if let (Some(bus), Some(subscription)) = (self.bus.take(), self.tick_subscription.take()) {
            bus.unsubscribe(subscription);
        }
        for network in &mut self.networks {
            network.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_ids_are_monotonic() {
        let mut manager = NetworkManager::new();
        let first = manager.create_network();
        let second = manager.create_network();
        assert_eq!(second, first + 1);
        assert_eq!(manager.count(), 2);
    }

    #[test]
    fn test_remove_network() {
        let mut manager = NetworkManager::new();
        let id = manager.create_network();
        manager.remove_network(id);
        assert_eq!(manager.count(), 0);
        assert!(manager.network(id).is_none());

        // Removing again is harmless.
        manager.remove_network(id);
    }

    #[test]
    fn test_attach_and_drop_unsubscribes() {
        let bus = Rc::new(EventBus::new());
        let manager = Rc::new(RefCell::new(NetworkManager::new()));

        NetworkManager::attach(&manager, &bus);
        assert_eq!(bus.handler_count::<Tick>(), 1);

        drop(manager);
        // The weak handler is gone after the manager drops...
        bus.emit(&Tick {
            delta_secs: 0.0,
            now_secs: 0,
        });
        assert_eq!(bus.handler_count::<Tick>(), 0);
    }
}
