//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Explicit `dt` per step, validated
//! - Seeded RNG only
//! - Stable iteration order (by ball ID)
//! - No rendering or platform dependencies

pub mod ball;
pub mod collision;
pub mod error;
pub mod geometry;
pub mod resolve;
pub mod spawn;
pub mod state;
pub mod tick;

pub use ball::{Arena, Ball, ColorTag};
pub use collision::{CollisionEvent, WallSide, detect};
pub use error::SimError;
pub use geometry::{Rect, distance, normalize, reflect};
pub use resolve::{Resolution, ResolveOptions, resolve, resolve_all};
pub use spawn::SpawnController;
pub use state::{EndReason, GameEvent, GamePhase, GameState};
pub use tick::{BallView, InputCommand, Simulation, Snapshot, SuctionView};
