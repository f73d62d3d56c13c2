//! Simulation errors
//!
//! Every variant is local and recoverable; the caller decides what the user sees.

use std::fmt;

use super::state::GamePhase;

#[derive(Debug, Clone, PartialEq)]
pub enum SimError {
    /// Non-positive or non-finite radius / arena dimension
    InvalidGeometry(String),
    /// Operation not allowed in the current phase
    InvalidStateTransition { from: GamePhase, op: &'static str },
    /// Negative, non-finite, or oversized step delta
    InvalidTimeStep(f32),
    /// No free spot found for a new ball
    SpawnExhausted { attempts: u32 },
    /// Configuration failed to parse or validate
    InvalidConfig(String),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::InvalidGeometry(msg) => write!(f, "invalid geometry: {msg}"),
            SimError::InvalidStateTransition { from, op } => {
                write!(f, "cannot {op} while {}", from.as_str())
            }
            SimError::InvalidTimeStep(dt) => write!(f, "invalid time step: {dt}"),
            SimError::SpawnExhausted { attempts } => {
                write!(f, "no free spawn position after {attempts} attempts")
            }
            SimError::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for SimError {}
