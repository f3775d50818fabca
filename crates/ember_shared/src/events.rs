//! Engine-level events shared by every unit.

/// The engine heartbeat.
///
/// Emitted once per fixed-step tick. Systems that need wall-clock time
/// (handshake deadlines, expiries) read `now_secs` from the tick rather
/// than sampling the clock themselves, which keeps them drivable from
/// tests with a synthetic clock.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tick {
    /// Seconds since the previous tick.
    pub delta_secs: f32,
    /// Wall-clock seconds (Unix epoch) at the start of this tick.
    pub now_secs: i64,
}

/// Emitted once when the engine stops its loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineShutdown;
