//! # Engine Loop
//!
//! Fixed-timestep driver emitting [`Tick`] on the engine bus.
//!
//! The ticker keeps a time accumulator so the tick rate stays constant
//! regardless of how long individual ticks take; persistently late
//! ticks are logged.

use std::rc::Rc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use ember_shared::{EngineShutdown, EventBus, Tick};
use serde::{Deserialize, Serialize};

use crate::systems::SystemRegistry;

/// Engine configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fixed tick rate in Hz.
    pub tick_rate: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { tick_rate: 60 }
    }
}

/// Fixed-timestep accumulator.
///
/// Call [`FixedStep::due_ticks`] once per outer loop iteration and run
/// that many ticks.
pub struct FixedStep {
    tick_duration: Duration,
    last: Instant,
    accumulator: Duration,
    late_ticks: u64,
}

impl FixedStep {
    /// Creates a ticker at `tick_rate` Hz.
    ///
    /// # Panics
    ///
    /// Panics if `tick_rate` is zero.
    #[must_use]
    pub fn new(tick_rate: u32) -> Self {
        assert!(tick_rate > 0, "tick rate must be positive");
        Self {
            tick_duration: Duration::from_micros(1_000_000 / u64::from(tick_rate)),
            last: Instant::now(),
            accumulator: Duration::ZERO,
            late_ticks: 0,
        }
    }

    /// Target duration of one tick.
    #[must_use]
    pub const fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    /// Number of ticks that have come due since the last call.
    ///
    /// Capped at 8 so a long stall cannot trigger a tick avalanche; the
    /// overshoot is dropped and counted as late.
    pub fn due_ticks(&mut self) -> u32 {
        let now = Instant::now();
        self.accumulator += now.duration_since(self.last);
        self.last = now;

        let mut due = 0u32;
        while self.accumulator >= self.tick_duration {
            self.accumulator -= self.tick_duration;
            due += 1;
        }
        if due > 8 {
            self.late_ticks += u64::from(due - 8);
            tracing::warn!(dropped = due - 8, "tick loop fell behind, dropping ticks");
            due = 8;
        }
        due
    }

    /// Sleeps until the next tick is due.
    pub fn wait(&self) {
        let elapsed = Instant::now().duration_since(self.last);
        if elapsed < self.tick_duration {
            std::thread::sleep(self.tick_duration - elapsed);
        }
    }

    /// Ticks dropped because the loop fell behind.
    #[must_use]
    pub const fn late_ticks(&self) -> u64 {
        self.late_ticks
    }
}

/// The engine: bus, ticker and system registry.
pub struct Engine {
    bus: Rc<EventBus>,
    systems: SystemRegistry,
    ticker: FixedStep,
    delta_secs: f32,
    tick_count: u64,
}

impl Engine {
    /// Creates an engine per `config`.
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            bus: Rc::new(EventBus::new()),
            systems: SystemRegistry::new(),
            ticker: FixedStep::new(config.tick_rate),
            delta_secs: 1.0 / config.tick_rate as f32,
            tick_count: 0,
        }
    }

    /// The engine bus.
    #[must_use]
    pub fn bus(&self) -> &Rc<EventBus> {
        &self.bus
    }

    /// The system registry.
    #[must_use]
    pub fn systems(&self) -> &SystemRegistry {
        &self.systems
    }

    /// The system registry, mutably.
    pub fn systems_mut(&mut self) -> &mut SystemRegistry {
        &mut self.systems
    }

    /// Total ticks emitted.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Emits `ticks` ticks back to back, without pacing. Test and tool
    /// entry point.
    pub fn pump(&mut self, ticks: u32) {
        for _ in 0..ticks {
            self.emit_tick();
        }
    }

    /// Runs the paced loop for `duration`, then emits
    /// [`EngineShutdown`].
    pub fn run_for(&mut self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while Instant::now() < deadline {
            for _ in 0..self.ticker.due_ticks() {
                self.emit_tick();
            }
            self.ticker.wait();
        }
        self.bus.emit(&EngineShutdown);
    }

    fn emit_tick(&mut self) {
        let now_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs() as i64);
        self.tick_count += 1;
        self.bus.emit(&Tick {
            delta_secs: self.delta_secs,
            now_secs,
        });
    }
}
