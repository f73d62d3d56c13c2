//! Ballpit - a steppable ball-arena simulation
//!
//! Core modules:
//! - `sim`: Deterministic simulation (balls, collisions, spawning, game state)
//! - `config`: Data-driven game setup and difficulty presets
//!
//! The crate never draws or opens windows. A presentation layer calls
//! [`sim::Simulation::step`] once per frame and draws the returned snapshot.

pub mod config;
pub mod sim;

pub use config::{CollisionPolicy, Difficulty, SimConfig, SuctionConfig};
pub use sim::{InputCommand, SimError, Simulation, Snapshot};

/// Simulation tuning constants
pub mod consts {
    /// Default upper bound on a single step's `dt` (seconds)
    pub const MAX_STEP_DT: f32 = 1.0;

    /// Detect/resolve passes per step before giving up on pathological stacks
    pub const MAX_RESOLUTION_PASSES: usize = 32;
    /// Extra separation added when pushing overlapping balls apart
    pub const SEPARATION_SLOP: f32 = 1e-3;

    /// Placement retries before a spawn is skipped
    pub const MAX_SPAWN_ATTEMPTS: u32 = 32;

    /// Ball defaults
    pub const BALL_RADIUS: f32 = 15.0;
    pub const BALL_MIN_SPEED: f32 = 60.0;
    pub const BALL_MAX_SPEED: f32 = 180.0;
    pub const BALL_VALUE: u32 = 1;

    /// Suction defaults - pull strength falls off linearly to zero at the range edge
    pub const SUCTION_RANGE: f32 = 100.0;
    pub const SUCTION_MAX_ACCEL: f32 = 900.0;
    pub const SUCTION_CAPTURE_MARGIN: f32 = 10.0;

    /// Eject speed range (pixels/s)
    pub const EJECT_MIN_SPEED: f32 = 120.0;
    pub const EJECT_MAX_SPEED: f32 = 300.0;

    /// Drain zone edge length when enabled via preset
    pub const DRAIN_ZONE_SIZE: f32 = 100.0;

    /// Lowest channel value for randomly generated colors (keeps balls visible on white)
    pub const COLOR_MIN_CHANNEL: u8 = 50;
}
