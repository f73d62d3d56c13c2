//! Game state and termination rules
//!
//! Everything a presentation layer needs to know about the run that isn't a
//! ball lives here.

use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::config::SimConfig;

/// Current phase of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GamePhase {
    /// Engine created, `start` not yet called
    #[default]
    NotStarted,
    /// Active gameplay
    Running,
    /// Game is paused
    Paused,
    /// Run finished; see `GameState::end_reason`
    Ended,
}

impl GamePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            GamePhase::NotStarted => "not started",
            GamePhase::Running => "running",
            GamePhase::Paused => "paused",
            GamePhase::Ended => "ended",
        }
    }
}

/// Why the run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    Won,
    Lost,
    Quit,
}

/// Per-step notifications (sound and effects hooks for the host)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    Spawned { id: u32 },
    Popped { id: u32, value: u32 },
    Destroyed { id: u32, value: u32 },
    Merged { survivor: u32, absorbed: u32 },
    Expired { id: u32 },
    /// Sucked into the inventory
    Absorbed { id: u32 },
    /// Put back from the inventory
    Ejected { id: u32 },
    Drained { id: u32 },
    SpawnSkipped { attempts: u32 },
    Ended { reason: EndReason },
}

/// RNG state wrapper for serialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RngState {
    pub seed: u64,
}

impl RngState {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn to_rng(&self) -> Pcg32 {
        Pcg32::seed_from_u64(self.seed)
    }
}

/// Run-level state owned by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GameState {
    pub phase: GamePhase,
    pub score: u64,
    /// Simulated seconds while Running
    pub elapsed: f32,
    pub end_reason: Option<EndReason>,
    /// Steps that actually advanced the simulation
    pub steps: u64,
    pub popped: u32,
    pub drained: u32,
    /// Seed the run's RNG was built from
    pub rng: RngState,
}

impl GameState {
    /// Fresh Running state
    pub fn running() -> Self {
        Self {
            phase: GamePhase::Running,
            ..Default::default()
        }
    }

    /// Fresh Running state for a run seeded with `seed`
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: RngState::new(seed),
            ..Self::running()
        }
    }

    pub fn is_over(&self) -> bool {
        self.phase == GamePhase::Ended
    }

    /// Move to Ended with the given reason; the first reason sticks
    pub fn end(&mut self, reason: EndReason) {
        if self.phase != GamePhase::Ended {
            self.phase = GamePhase::Ended;
            self.end_reason = Some(reason);
        }
    }
}

/// What the rule check needs to know about the field this step
#[derive(Debug, Clone, Copy)]
pub struct FieldStatus {
    pub balls: usize,
    pub inventory: usize,
    pub drained_this_step: usize,
}

/// Decide whether the run is over
///
/// Win conditions are checked before lose conditions.
pub fn evaluate(state: &GameState, field: FieldStatus, config: &SimConfig) -> Option<EndReason> {
    if let Some(target) = config.win_score {
        if state.score >= target {
            return Some(EndReason::Won);
        }
    }
    if config.clear_to_win && field.balls == 0 && field.inventory == 0 {
        return Some(EndReason::Won);
    }
    if let Some(timeout) = config.lose_timeout {
        if state.elapsed >= timeout {
            return Some(EndReason::Lost);
        }
    }
    if config.lose_on_drain && field.drained_this_step > 0 {
        return Some(EndReason::Lost);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(balls: usize) -> FieldStatus {
        FieldStatus {
            balls,
            inventory: 0,
            drained_this_step: 0,
        }
    }

    #[test]
    fn test_end_reason_sticks() {
        let mut state = GameState::running();
        state.end(EndReason::Quit);
        state.end(EndReason::Won);
        assert!(state.is_over());
        assert_eq!(state.end_reason, Some(EndReason::Quit));
    }

    #[test]
    fn test_win_by_score() {
        let config = SimConfig {
            win_score: Some(10),
            ..Default::default()
        };
        let mut state = GameState::running();
        state.score = 9;
        assert_eq!(evaluate(&state, field(3), &config), None);
        state.score = 10;
        assert_eq!(evaluate(&state, field(3), &config), Some(EndReason::Won));
    }

    #[test]
    fn test_clear_to_win_counts_inventory() {
        let config = SimConfig {
            clear_to_win: true,
            ..Default::default()
        };
        let state = GameState::running();
        let holding = FieldStatus {
            balls: 0,
            inventory: 1,
            drained_this_step: 0,
        };
        assert_eq!(evaluate(&state, holding, &config), None);
        assert_eq!(evaluate(&state, field(0), &config), Some(EndReason::Won));
    }

    #[test]
    fn test_lose_by_timeout_and_drain() {
        let config = SimConfig {
            lose_timeout: Some(30.0),
            lose_on_drain: true,
            ..Default::default()
        };
        let mut state = GameState::running();
        state.elapsed = 29.9;
        assert_eq!(evaluate(&state, field(2), &config), None);

        let drained = FieldStatus {
            balls: 2,
            inventory: 0,
            drained_this_step: 1,
        };
        assert_eq!(evaluate(&state, drained, &config), Some(EndReason::Lost));

        state.elapsed = 30.0;
        assert_eq!(evaluate(&state, field(2), &config), Some(EndReason::Lost));
    }

    #[test]
    fn test_win_beats_lose_same_step() {
        let config = SimConfig {
            win_score: Some(5),
            lose_timeout: Some(10.0),
            ..Default::default()
        };
        let mut state = GameState::running();
        state.score = 5;
        state.elapsed = 10.0;
        assert_eq!(evaluate(&state, field(1), &config), Some(EndReason::Won));
    }

    #[test]
    fn test_rng_state_reproducible() {
        use rand::Rng;
        let mut a = RngState::new(42).to_rng();
        let mut b = RngState::new(42).to_rng();
        for _ in 0..16 {
            assert_eq!(a.random::<u32>(), b.random::<u32>());
        }
    }
}
