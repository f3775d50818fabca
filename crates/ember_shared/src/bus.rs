//! # Event Bus
//!
//! Synchronous, single-threaded signal hub.
//!
//! ## Design
//!
//! - Handlers are keyed by event type and run synchronously inside
//!   `emit`, in subscription order.
//! - The handler list is snapshotted per emit, so a handler may emit
//!   further events (including the same type) without invalidating the
//!   iteration. A handler that re-emits an event routed back to itself
//!   will panic on the nested borrow; don't do that.
//! - Subscribing or unsubscribing from inside a handler takes effect on
//!   the *next* emit.

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

type BoxedHandler = Rc<RefCell<dyn FnMut(&dyn Any)>>;

struct HandlerEntry {
    id: u64,
    func: BoxedHandler,
}

/// Token returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Subscription {
    type_id: TypeId,
    id: u64,
}

/// Synchronous signal hub keyed by event type.
///
/// The bus is single-threaded by contract: every unit of the engine
/// shares one bus on the tick thread, and handlers run inside the
/// emitter's call frame.
#[derive(Default)]
pub struct EventBus {
    handlers: RefCell<HashMap<TypeId, Vec<HandlerEntry>>>,
    next_id: Cell<u64>,
}

impl EventBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a handler for events of type `E`.
    ///
    /// Handlers are invoked in subscription order.
    pub fn subscribe<E: 'static>(&self, mut handler: impl FnMut(&E) + 'static) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let func: BoxedHandler = Rc::new(RefCell::new(move |any: &dyn Any| {
            if let Some(event) = any.downcast_ref::<E>() {
                handler(event);
            }
        }));

        self.handlers
            .borrow_mut()
            .entry(TypeId::of::<E>())
            .or_default()
            .push(HandlerEntry { id, func });

        Subscription {
            type_id: TypeId::of::<E>(),
            id,
        }
    }

    /// Removes a previously registered handler.
    ///
    /// Unknown or already-removed tokens are ignored.
    pub fn unsubscribe(&self, subscription: Subscription) {
        if let Some(entries) = self.handlers.borrow_mut().get_mut(&subscription.type_id) {
            entries.retain(|entry| entry.id != subscription.id);
        }
    }

    /// Emits an event, invoking every subscribed handler synchronously.
    pub fn emit<E: 'static>(&self, event: &E) {
        // Snapshot so handlers can subscribe/emit without holding the map borrow.
        let snapshot: Vec<BoxedHandler> = match self.handlers.borrow().get(&TypeId::of::<E>()) {
            Some(entries) => entries.iter().map(|entry| Rc::clone(&entry.func)).collect(),
            None => return,
        };

        for handler in snapshot {
            let mut func = handler.borrow_mut();
            (&mut *func)(event);
        }
    }

    /// Returns the number of handlers registered for `E`.
    #[must_use]
    pub fn handler_count<E: 'static>(&self) -> usize {
        self.handlers
            .borrow()
            .get(&TypeId::of::<E>())
            .map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Ping(u32);

    #[derive(Debug)]
    struct Pong(u32);

    #[test]
    fn test_subscribe_emit() {
        let bus = EventBus::new();
        let seen = Rc::new(Cell::new(0u32));

        let seen2 = Rc::clone(&seen);
        bus.subscribe::<Ping>(move |ping| seen2.set(seen2.get() + ping.0));

        bus.emit(&Ping(3));
        bus.emit(&Ping(4));
        assert_eq!(seen.get(), 7);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let seen = Rc::new(Cell::new(0u32));

        let seen2 = Rc::clone(&seen);
        let sub = bus.subscribe::<Ping>(move |_| seen2.set(seen2.get() + 1));

        bus.emit(&Ping(0));
        bus.unsubscribe(sub);
        bus.emit(&Ping(0));

        assert_eq!(seen.get(), 1);
        assert_eq!(bus.handler_count::<Ping>(), 0);
    }

    #[test]
    fn test_handlers_run_in_subscription_order() {
        let bus = EventBus::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for tag in 0..3 {
            let order2 = Rc::clone(&order);
            bus.subscribe::<Ping>(move |_| order2.borrow_mut().push(tag));
        }

        bus.emit(&Ping(0));
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_nested_emit_of_other_type() {
        let bus = Rc::new(EventBus::new());
        let seen = Rc::new(Cell::new(0u32));

        let bus2 = Rc::clone(&bus);
        bus.subscribe::<Ping>(move |ping| bus2.emit(&Pong(ping.0 * 2)));

        let seen2 = Rc::clone(&seen);
        bus.subscribe::<Pong>(move |pong| seen2.set(pong.0));

        bus.emit(&Ping(21));
        assert_eq!(seen.get(), 42);
    }

    #[test]
    fn test_emit_with_no_handlers() {
        let bus = EventBus::new();
        bus.emit(&Ping(1));
    }
}
