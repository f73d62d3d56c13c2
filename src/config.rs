//! Game configuration and difficulty presets
//!
//! `SimConfig` is plain data. It can be built in code, taken from a preset,
//! or parsed from a JSON string handed over by the host (the core never
//! touches the filesystem).

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::sim::SimError;
use crate::sim::geometry::Rect;

/// What happens when two balls overlap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CollisionPolicy {
    /// Equal-mass elastic bounce
    #[default]
    Elastic,
    /// Both balls are removed and their values scored
    Destructive,
    /// The lower-id ball absorbs the other
    Merge,
}

impl CollisionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollisionPolicy::Elastic => "Elastic",
            CollisionPolicy::Destructive => "Destructive",
            CollisionPolicy::Merge => "Merge",
        }
    }
}

/// Difficulty presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Normal => "Normal",
            Difficulty::Hard => "Hard",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "normal" | "norm" => Some(Difficulty::Normal),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }

    /// Seconds between spawn attempts
    pub fn spawn_interval(&self) -> f32 {
        match self {
            Difficulty::Easy => 3.0,
            Difficulty::Normal => 2.0,
            Difficulty::Hard => 1.0,
        }
    }

    /// Initial (min, max) ball speed in pixels/s
    pub fn speed_range(&self) -> (f32, f32) {
        match self {
            Difficulty::Easy => (40.0, 100.0),
            Difficulty::Normal => (BALL_MIN_SPEED, BALL_MAX_SPEED),
            Difficulty::Hard => (100.0, 260.0),
        }
    }
}

/// Suction (pointer vacuum) tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuctionConfig {
    /// Radius around the pointer that pulls balls in
    pub range: f32,
    /// Pull acceleration at the pointer itself (pixels/s²)
    pub max_accel: f32,
    /// Balls closer than `radius + capture_margin` are absorbed
    pub capture_margin: f32,
}

impl Default for SuctionConfig {
    fn default() -> Self {
        Self {
            range: SUCTION_RANGE,
            max_accel: SUCTION_MAX_ACCEL,
            capture_margin: SUCTION_CAPTURE_MARGIN,
        }
    }
}

/// Full simulation setup passed to `Simulation::start`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Run seed for reproducibility
    pub seed: u64,
    pub initial_ball_count: u32,
    /// (min, max) radius for spawned balls
    pub ball_radius_range: (f32, f32),
    /// (min, max) initial speed for spawned balls
    pub speed_range: (f32, f32),
    pub collision_policy: CollisionPolicy,
    /// Seconds between timed spawns (None = no timed spawning)
    pub spawn_interval: Option<f32>,
    pub win_score: Option<u64>,
    /// Lose once this many seconds have elapsed
    pub lose_timeout: Option<f32>,

    // === Balls ===
    /// Score value of each spawned ball
    pub ball_value: u32,
    /// Lifetime of spawned balls in seconds (None = forever)
    pub ball_lifetime: Option<f32>,
    /// Hard cap on balls in play
    pub max_balls: u32,

    // === Difficulty ===
    /// Every this many points the target ball count grows by one
    pub score_milestone: Option<u64>,
    /// Spawn speed scale gained per second of play
    pub speed_ramp: f32,
    pub max_speed_scale: f32,

    // === Physics ===
    /// 1.0 = perfectly elastic walls
    pub wall_restitution: f32,
    /// Exponential velocity decay per second (0 = none)
    pub linear_damping: f32,
    /// Blend colors of touching balls
    pub mix_colors: bool,

    // === Rules ===
    /// Win when the field and inventory are both empty
    pub clear_to_win: bool,
    /// Balls whose center enters this rectangle are removed
    pub drain_zone: Option<Rect>,
    /// Draining a ball loses the game
    pub lose_on_drain: bool,

    // === Input ===
    pub suction: SuctionConfig,
    pub eject_speed_range: (f32, f32),

    /// Largest accepted `dt` per step
    pub max_dt: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            initial_ball_count: 10,
            ball_radius_range: (BALL_RADIUS, BALL_RADIUS),
            speed_range: (BALL_MIN_SPEED, BALL_MAX_SPEED),
            collision_policy: CollisionPolicy::Elastic,
            spawn_interval: None,
            win_score: None,
            lose_timeout: None,

            ball_value: BALL_VALUE,
            ball_lifetime: None,
            max_balls: 64,

            score_milestone: None,
            speed_ramp: 0.0,
            max_speed_scale: 1.0,

            wall_restitution: 1.0,
            linear_damping: 0.0,
            mix_colors: true,

            clear_to_win: false,
            drain_zone: None,
            lose_on_drain: false,

            suction: SuctionConfig::default(),
            eject_speed_range: (EJECT_MIN_SPEED, EJECT_MAX_SPEED),

            max_dt: MAX_STEP_DT,
        }
    }
}

impl SimConfig {
    /// Create a config from a difficulty preset
    pub fn from_preset(preset: Difficulty) -> Self {
        let mut config = Self::default();
        config.apply_preset(preset);
        config
    }

    /// Apply a difficulty preset (updates difficulty-dependent fields)
    pub fn apply_preset(&mut self, preset: Difficulty) {
        self.spawn_interval = Some(preset.spawn_interval());
        self.speed_range = preset.speed_range();
        self.score_milestone = Some(10);
        match preset {
            Difficulty::Easy => {
                self.initial_ball_count = 5;
                self.ball_radius_range = (18.0, 26.0);
                self.win_score = Some(30);
                self.lose_timeout = None;
            }
            Difficulty::Normal => {
                self.initial_ball_count = 10;
                self.ball_radius_range = (12.0, 20.0);
                self.win_score = Some(50);
                self.lose_timeout = Some(120.0);
                self.speed_ramp = 0.005;
                self.max_speed_scale = 1.5;
            }
            Difficulty::Hard => {
                self.initial_ball_count = 15;
                self.ball_radius_range = (8.0, 16.0);
                self.win_score = Some(100);
                self.lose_timeout = Some(90.0);
                self.speed_ramp = 0.02;
                self.max_speed_scale = 2.5;
                self.ball_lifetime = Some(12.0);
            }
        }
    }

    /// Parse a JSON config; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        let config: SimConfig =
            serde_json::from_str(json).map_err(|e| SimError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, SimError> {
        serde_json::to_string_pretty(self).map_err(|e| SimError::InvalidConfig(e.to_string()))
    }

    /// Check ranges and option values
    pub fn validate(&self) -> Result<(), SimError> {
        let (r_min, r_max) = self.ball_radius_range;
        if !(r_min.is_finite() && r_max.is_finite() && r_min > 0.0 && r_min <= r_max) {
            return Err(SimError::InvalidGeometry(format!(
                "ball radius range must satisfy 0 < min <= max, got ({r_min}, {r_max})"
            )));
        }
        check_range("speed_range", self.speed_range)?;
        check_range("eject_speed_range", self.eject_speed_range)?;
        check_positive("spawn_interval", self.spawn_interval)?;
        check_positive("lose_timeout", self.lose_timeout)?;
        check_positive("ball_lifetime", self.ball_lifetime)?;
        check_positive("max_dt", Some(self.max_dt))?;
        if self.score_milestone == Some(0) {
            return Err(invalid("score_milestone must be positive"));
        }
        if self.max_balls < self.initial_ball_count {
            return Err(invalid("max_balls must be at least initial_ball_count"));
        }
        if !(0.0..=1.0).contains(&self.wall_restitution) {
            return Err(invalid("wall_restitution must be within [0, 1]"));
        }
        if !(self.linear_damping.is_finite() && self.linear_damping >= 0.0) {
            return Err(invalid("linear_damping must be non-negative"));
        }
        if !(self.speed_ramp.is_finite() && self.speed_ramp >= 0.0) {
            return Err(invalid("speed_ramp must be non-negative"));
        }
        if !(self.max_speed_scale.is_finite() && self.max_speed_scale >= 1.0) {
            return Err(invalid("max_speed_scale must be at least 1"));
        }
        let s = &self.suction;
        let non_negative = |v: f32| v.is_finite() && v >= 0.0;
        if !(s.range.is_finite()
            && s.range > 0.0
            && non_negative(s.max_accel)
            && non_negative(s.capture_margin))
        {
            return Err(invalid("suction settings out of range"));
        }
        if let Some(zone) = self.drain_zone {
            if !(zone.width() > 0.0 && zone.height() > 0.0) {
                return Err(SimError::InvalidGeometry("drain zone must have area".into()));
            }
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> SimError {
    SimError::InvalidConfig(msg.to_string())
}

fn check_range(name: &str, (min, max): (f32, f32)) -> Result<(), SimError> {
    if min.is_finite() && max.is_finite() && min >= 0.0 && min <= max {
        Ok(())
    } else {
        Err(SimError::InvalidConfig(format!(
            "{name} must satisfy 0 <= min <= max, got ({min}, {max})"
        )))
    }
}

fn check_positive(name: &str, value: Option<f32>) -> Result<(), SimError> {
    match value {
        Some(v) if !(v.is_finite() && v > 0.0) => Err(SimError::InvalidConfig(format!(
            "{name} must be positive, got {v}"
        ))),
        _ => Ok(()),
    }
}
