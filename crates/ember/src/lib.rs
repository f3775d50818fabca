//! # Ember
//!
//! The engine runtime, integrating all units.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      EMBER ENGINE                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐     │
//! │  │ ember_core   │   │ ember_net... │   │ app systems  │     │
//! │  │ (ECS store)  │   │ (sessions)   │   │              │     │
//! │  └──────┬───────┘   └──────┬───────┘   └──────┬───────┘     │
//! │         │                  │                  │             │
//! │         └────────────┬─────┴─────┬────────────┘             │
//! │                      │ event bus │                          │
//! │                      └─────┬─────┘                          │
//! │                   ┌────────▼────────┐                       │
//! │                   │ Engine          │                       │
//! │                   │ • fixed-step    │                       │
//! │                   │ • Tick emission │                       │
//! │                   │ • system lookup │                       │
//! │                   └─────────────────┘                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine owns the bus and a fixed-step ticker. Each tick it emits
//! [`ember_shared::Tick`]; the network manager (and anything else
//! subscribed) services itself inside that emission.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod engine;
pub mod systems;

pub use engine::{Engine, EngineConfig, FixedStep};
pub use systems::SystemRegistry;
