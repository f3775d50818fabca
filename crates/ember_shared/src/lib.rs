//! # Ember Shared
//!
//! Common plumbing used by every Ember engine unit.
//!
//! ## CRITICAL RULE
//!
//! This crate must NEVER depend on another engine crate. It holds only
//! the event bus and the event types every unit agrees on; anything
//! heavier belongs in `ember_core` or `ember_networking`.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod bus;
pub mod events;

pub use bus::{EventBus, Subscription};
pub use events::{EngineShutdown, Tick};
