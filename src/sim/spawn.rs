//! Spawning and difficulty ramp
//!
//! New balls always land fully inside the arena, clear of every other ball
//! and of the drain zone. When no such spot turns up within
//! `MAX_SPAWN_ATTEMPTS` tries the spawn is skipped.

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;

use super::ball::{Arena, Ball, ColorTag};
use super::error::SimError;
use super::geometry::distance;
use crate::config::SimConfig;
use crate::consts::MAX_SPAWN_ATTEMPTS;

/// True if a circle at `pos` would overlap no live ball and stay out of the drain zone
pub fn is_free(balls: &[Ball], pos: Vec2, radius: f32, config: &SimConfig) -> bool {
    if let Some(zone) = config.drain_zone {
        if zone.intersects_circle(pos, radius) {
            return false;
        }
    }
    balls
        .iter()
        .all(|b| distance(b.pos, pos) >= b.radius + radius)
}

/// Clamp a requested point so the circle fits, then check it is free
pub fn free_spot_at(
    arena: &Arena,
    balls: &[Ball],
    point: Vec2,
    radius: f32,
    config: &SimConfig,
) -> Option<Vec2> {
    if radius > arena.max_radius() {
        return None;
    }
    let pos = point.clamp(
        Vec2::splat(radius),
        Vec2::new(arena.width() - radius, arena.height() - radius),
    );
    is_free(balls, pos, radius, config).then_some(pos)
}

/// Random velocity with speed drawn from `range` and scaled
pub fn random_velocity(rng: &mut Pcg32, (min, max): (f32, f32), scale: f32) -> Vec2 {
    let speed = rng.random_range(min..=max) * scale;
    let angle = rng.random_range(0.0..std::f32::consts::TAU);
    Vec2::from_angle(angle) * speed
}

/// Timed spawner with a monotonic difficulty ramp
#[derive(Debug, Clone, Default)]
pub struct SpawnController {
    timer: f32,
}

impl SpawnController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn speed multiplier; grows with play time, never shrinks
    pub fn speed_scale(elapsed: f32, config: &SimConfig) -> f32 {
        (1.0 + config.speed_ramp * elapsed).min(config.max_speed_scale)
    }

    /// How many balls the field should hold at this score
    pub fn target_count(score: u64, config: &SimConfig) -> u32 {
        let bonus = config
            .score_milestone
            .map(|m| (score / m).min(u32::MAX as u64) as u32)
            .unwrap_or(0);
        config
            .initial_ball_count
            .saturating_add(bonus)
            .min(config.max_balls)
    }

    /// Advance the spawn timer; true when a spawn should be attempted this step
    pub fn due(&mut self, dt: f32, live: usize, score: u64, config: &SimConfig) -> bool {
        let Some(interval) = config.spawn_interval else {
            return false;
        };
        self.timer += dt;
        if self.timer < interval {
            return false;
        }
        // At most one spawn per step, even after a long frame
        self.timer = (self.timer - interval) % interval;
        live < Self::target_count(score, config) as usize
    }

    /// Build a ball at a random free position
    pub fn place_random(
        id: u32,
        rng: &mut Pcg32,
        arena: &Arena,
        balls: &[Ball],
        config: &SimConfig,
        speed_scale: f32,
    ) -> Result<Ball, SimError> {
        let (r_min, r_max) = config.ball_radius_range;
        let radius = rng.random_range(r_min..=r_max);
        if radius > arena.max_radius() {
            return Err(SimError::InvalidGeometry(format!(
                "ball radius {radius} does not fit a {}x{} arena",
                arena.width(),
                arena.height()
            )));
        }
        let vel = random_velocity(rng, config.speed_range, speed_scale);
        let color = ColorTag::random(rng);

        for _ in 0..MAX_SPAWN_ATTEMPTS {
            let pos = Vec2::new(
                rng.random_range(radius..=arena.width() - radius),
                rng.random_range(radius..=arena.height() - radius),
            );
            if is_free(balls, pos, radius, config) {
                let ball = Ball::new(id, pos, vel, radius)?
                    .with_color(color)
                    .with_value(config.ball_value)
                    .with_lifetime(config.ball_lifetime);
                return Ok(ball);
            }
        }
        Err(SimError::SpawnExhausted {
            attempts: MAX_SPAWN_ATTEMPTS,
        })
    }
}
