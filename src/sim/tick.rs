//! Simulation engine
//!
//! The host calls `step` once per frame with the elapsed time and any queued
//! input; the engine advances every ball, resolves collisions, applies input,
//! spawns, checks the rules, and hands back an owned snapshot.

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::ball::{Arena, Ball, ColorTag};
use super::error::SimError;
use super::geometry::{Rect, distance, normalize};
use super::resolve::{ResolveOptions, resolve_all};
use super::spawn::{SpawnController, free_spot_at, random_velocity};
use super::state::{EndReason, FieldStatus, GameEvent, GamePhase, GameState, RngState, evaluate};
use crate::config::SimConfig;

/// Input commands for a single step, applied in order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InputCommand {
    /// Pop the topmost ball under the pointer
    PopAt { x: f32, y: f32 },
    Pause,
    Resume,
    Quit,
    /// Begin pulling balls toward the pointer
    SuctionStart { x: f32, y: f32 },
    /// Pointer moved while suction is held
    SuctionMove { x: f32, y: f32 },
    SuctionStop,
    /// Put the most recently absorbed ball back at the pointer
    Eject { x: f32, y: f32 },
    /// Drop a fresh ball at the pointer
    AddBall { x: f32, y: f32 },
}

impl InputCommand {
    fn is_control(&self) -> bool {
        matches!(self, InputCommand::Pause | InputCommand::Resume | InputCommand::Quit)
    }
}

/// Drawable view of one ball
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallView {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub color: ColorTag,
}

impl From<&Ball> for BallView {
    fn from(ball: &Ball) -> Self {
        Self {
            id: ball.id,
            x: ball.pos.x,
            y: ball.pos.y,
            radius: ball.radius,
            color: ball.color,
        }
    }
}

/// Active suction, for drawing the pull radius
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SuctionView {
    pub x: f32,
    pub y: f32,
    pub range: f32,
}

/// Owned point-in-time copy of everything the host draws
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub phase: GamePhase,
    pub score: u64,
    pub elapsed: f32,
    pub end_reason: Option<EndReason>,
    /// Balls in id order (draw order: later ids on top)
    pub balls: Vec<BallView>,
    /// Balls held by suction
    pub inventory: usize,
    pub suction: Option<SuctionView>,
    pub drain_zone: Option<Rect>,
    /// What happened during the step that produced this snapshot
    pub events: Vec<GameEvent>,
}

/// Index of the ball drawn on top at `p` (highest id wins)
pub fn topmost_at(balls: &[Ball], p: Vec2) -> Option<usize> {
    balls.iter().rposition(|b| b.contains_point(p))
}

/// One independent game
#[derive(Debug, Clone)]
pub struct Simulation {
    config: SimConfig,
    arena: Option<Arena>,
    state: GameState,
    /// Live balls, sorted by id
    balls: Vec<Ball>,
    /// Absorbed balls, last in first out
    inventory: Vec<Ball>,
    suction: Option<Vec2>,
    spawner: SpawnController,
    rng: Pcg32,
    next_id: u32,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulation {
    pub fn new() -> Self {
        let config = SimConfig::default();
        let rng = RngState::new(config.seed).to_rng();
        Self {
            config,
            arena: None,
            state: GameState::default(),
            balls: Vec::new(),
            inventory: Vec::new(),
            suction: None,
            spawner: SpawnController::new(),
            rng,
            next_id: 1,
        }
    }

    /// Begin a run; also restarts a finished one
    pub fn start(&mut self, width: f32, height: f32, config: SimConfig) -> Result<GameState, SimError> {
        if matches!(self.state.phase, GamePhase::Running | GamePhase::Paused) {
            return Err(self.transition_error("start"));
        }
        let arena = Arena::new(width, height)?;
        config.validate()?;
        if config.ball_radius_range.1 > arena.max_radius() {
            return Err(SimError::InvalidGeometry(format!(
                "max ball radius {} does not fit a {width}x{height} arena",
                config.ball_radius_range.1
            )));
        }

        self.state = GameState::seeded(config.seed);
        self.rng = self.state.rng.to_rng();
        self.config = config;
        self.arena = Some(arena);
        self.balls.clear();
        self.inventory.clear();
        self.suction = None;
        self.spawner = SpawnController::new();
        self.next_id = 1;

        for _ in 0..self.config.initial_ball_count {
            match SpawnController::place_random(
                self.next_id,
                &mut self.rng,
                &arena,
                &self.balls,
                &self.config,
                1.0,
            ) {
                Ok(ball) => {
                    self.next_id += 1;
                    self.balls.push(ball);
                }
                Err(SimError::SpawnExhausted { attempts }) => {
                    log::warn!(
                        "Arena full after {} of {} initial balls ({} attempts)",
                        self.balls.len(),
                        self.config.initial_ball_count,
                        attempts
                    );
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        log::info!(
            "Started {}x{} arena with {} balls (seed {}, {} policy)",
            width,
            height,
            self.balls.len(),
            self.config.seed,
            self.config.collision_policy.as_str()
        );
        Ok(self.state.clone())
    }

    /// Advance the simulation by `dt` seconds
    ///
    /// `Pause`/`Resume`/`Quit` are applied before anything moves; pointer
    /// commands after collisions are resolved. A step on a paused game must
    /// carry a `Resume` (or `Quit`). Once the game has ended every step is a
    /// no-op returning the final snapshot. A zero-length step without
    /// commands is a pure read.
    pub fn step(&mut self, dt: f32, commands: &[InputCommand]) -> Result<Snapshot, SimError> {
        if self.state.phase == GamePhase::Ended {
            return Ok(self.snapshot());
        }
        if !(dt.is_finite() && dt >= 0.0 && dt <= self.config.max_dt) {
            return Err(SimError::InvalidTimeStep(dt));
        }
        let Some(arena) = self.arena else {
            return Err(self.transition_error("step"));
        };
        match self.state.phase {
            GamePhase::NotStarted => return Err(self.transition_error("step")),
            GamePhase::Ended => return Ok(self.snapshot()),
            GamePhase::Paused => {
                let wakes = commands
                    .iter()
                    .any(|c| matches!(c, InputCommand::Resume | InputCommand::Quit));
                if !wakes {
                    return Err(self.transition_error("step"));
                }
            }
            GamePhase::Running => {}
        }

        let mut events = Vec::new();
        self.apply_control(commands, &mut events);
        if self.state.phase != GamePhase::Running || (dt == 0.0 && commands.is_empty()) {
            return Ok(self.snapshot_with(events));
        }

        self.advance(dt, &mut events);

        let opts = self.resolve_options(&arena);
        let resolution = resolve_all(&mut self.balls, &arena, &opts);
        self.state.score += resolution.score;
        events.extend(resolution.events);

        self.apply_pointer(commands, &arena, &mut events);
        self.capture_suction(&mut events);
        if dt > 0.0 {
            self.spawn(dt, &arena, &mut events);
        }
        let drained = self.drain(&mut events);

        self.state.elapsed += dt;
        self.state.steps += 1;

        let field = FieldStatus {
            balls: self.balls.len(),
            inventory: self.inventory.len(),
            drained_this_step: drained,
        };
        if let Some(reason) = evaluate(&self.state, field, &self.config) {
            self.finish(reason, &mut events);
        }

        log::trace!(
            "step {}: {} balls, score {}, {} events",
            self.state.steps,
            self.balls.len(),
            self.state.score,
            events.len()
        );
        Ok(self.snapshot_with(events))
    }

    pub fn pause(&mut self) -> Result<(), SimError> {
        if self.state.phase != GamePhase::Running {
            return Err(self.transition_error("pause"));
        }
        self.state.phase = GamePhase::Paused;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), SimError> {
        if self.state.phase != GamePhase::Paused {
            return Err(self.transition_error("resume"));
        }
        self.state.phase = GamePhase::Running;
        Ok(())
    }

    pub fn quit(&mut self) -> Result<(), SimError> {
        if !matches!(self.state.phase, GamePhase::Running | GamePhase::Paused) {
            return Err(self.transition_error("quit"));
        }
        self.finish(EndReason::Quit, &mut Vec::new());
        Ok(())
    }

    /// Place a ball exactly as given; overlaps are resolved on the next step
    pub fn insert_ball(&mut self, pos: Vec2, vel: Vec2, radius: f32) -> Result<u32, SimError> {
        if !matches!(self.state.phase, GamePhase::Running | GamePhase::Paused) {
            return Err(self.transition_error("insert a ball"));
        }
        let Some(arena) = self.arena else {
            return Err(self.transition_error("insert a ball"));
        };
        if !arena.contains_circle(pos, radius) {
            return Err(SimError::InvalidGeometry(format!(
                "ball at ({}, {}) radius {radius} is outside the arena",
                pos.x, pos.y
            )));
        }
        let id = self.next_id;
        let ball = Ball::new(id, pos, vel, radius)?
            .with_color(ColorTag::random(&mut self.rng))
            .with_value(self.config.ball_value)
            .with_lifetime(self.config.ball_lifetime);
        self.next_id += 1;
        self.balls.push(ball);
        Ok(id)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_with(Vec::new())
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn phase(&self) -> GamePhase {
        self.state.phase
    }

    /// Live balls in id order
    pub fn balls(&self) -> &[Ball] {
        &self.balls
    }

    pub fn inventory_len(&self) -> usize {
        self.inventory.len()
    }

    pub fn arena(&self) -> Option<&Arena> {
        self.arena.as_ref()
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    fn transition_error(&self, op: &'static str) -> SimError {
        SimError::InvalidStateTransition {
            from: self.state.phase,
            op,
        }
    }

    fn resolve_options(&self, arena: &Arena) -> ResolveOptions {
        ResolveOptions {
            policy: self.config.collision_policy,
            wall_restitution: self.config.wall_restitution,
            mix_colors: self.config.mix_colors,
            max_radius: arena.max_radius(),
        }
    }

    fn finish(&mut self, reason: EndReason, events: &mut Vec<GameEvent>) {
        self.state.end(reason);
        self.suction = None;
        events.push(GameEvent::Ended { reason });
        log::info!(
            "Game ended ({:?}) after {:.2}s with score {}",
            reason,
            self.state.elapsed,
            self.state.score
        );
    }

    fn apply_control(&mut self, commands: &[InputCommand], events: &mut Vec<GameEvent>) {
        for command in commands.iter().filter(|c| c.is_control()) {
            match (command, self.state.phase) {
                (InputCommand::Pause, GamePhase::Running) => self.state.phase = GamePhase::Paused,
                (InputCommand::Resume, GamePhase::Paused) => self.state.phase = GamePhase::Running,
                (InputCommand::Quit, GamePhase::Running | GamePhase::Paused) => {
                    self.finish(EndReason::Quit, events)
                }
                _ => {}
            }
        }
    }

    /// Integrate, pull toward suction, damp, and expire balls
    fn advance(&mut self, dt: f32, events: &mut Vec<GameEvent>) {
        for ball in &mut self.balls {
            ball.advance(dt);
        }

        if let Some(point) = self.suction {
            let s = self.config.suction;
            for ball in &mut self.balls {
                let d = distance(ball.pos, point);
                if d <= s.range {
                    let strength = (s.range - d) / s.range;
                    ball.vel += normalize(point - ball.pos) * strength * s.max_accel * dt;
                }
            }
        }

        if self.config.linear_damping > 0.0 {
            let keep = (-self.config.linear_damping * dt).exp();
            for ball in &mut self.balls {
                ball.vel *= keep;
            }
        }

        self.balls.retain_mut(|ball| {
            if ball.tick_lifetime(dt) {
                events.push(GameEvent::Expired { id: ball.id });
                false
            } else {
                true
            }
        });
    }

    fn apply_pointer(&mut self, commands: &[InputCommand], arena: &Arena, events: &mut Vec<GameEvent>) {
        for command in commands {
            match *command {
                InputCommand::PopAt { x, y } => {
                    if let Some(i) = topmost_at(&self.balls, Vec2::new(x, y)) {
                        let ball = self.balls.remove(i);
                        self.state.score += ball.value as u64;
                        self.state.popped += 1;
                        events.push(GameEvent::Popped {
                            id: ball.id,
                            value: ball.value,
                        });
                    }
                }
                InputCommand::SuctionStart { x, y } | InputCommand::SuctionMove { x, y } => {
                    self.suction = Some(Vec2::new(x, y));
                }
                InputCommand::SuctionStop => self.suction = None,
                InputCommand::Eject { x, y } => self.eject(Vec2::new(x, y), arena, events),
                InputCommand::AddBall { x, y } => self.add_ball(Vec2::new(x, y), arena, events),
                InputCommand::Pause | InputCommand::Resume | InputCommand::Quit => {}
            }
        }
    }

    fn eject(&mut self, point: Vec2, arena: &Arena, events: &mut Vec<GameEvent>) {
        let Some(mut ball) = self.inventory.pop() else {
            return;
        };
        match free_spot_at(arena, &self.balls, point, ball.radius, &self.config) {
            Some(pos) => {
                ball.pos = pos;
                ball.vel = random_velocity(&mut self.rng, self.config.eject_speed_range, 1.0);
                events.push(GameEvent::Ejected { id: ball.id });
                let at = self.balls.partition_point(|b| b.id < ball.id);
                self.balls.insert(at, ball);
            }
            None => {
                log::debug!("Eject blocked at ({}, {})", point.x, point.y);
                self.inventory.push(ball);
            }
        }
    }

    fn add_ball(&mut self, point: Vec2, arena: &Arena, events: &mut Vec<GameEvent>) {
        if self.balls.len() >= self.config.max_balls as usize {
            log::debug!("Ball cap {} reached, ignoring add", self.config.max_balls);
            return;
        }
        let (r_min, r_max) = self.config.ball_radius_range;
        let radius = self.rng.random_range(r_min..=r_max);
        let Some(pos) = free_spot_at(arena, &self.balls, point, radius, &self.config) else {
            log::debug!("No room for a ball at ({}, {})", point.x, point.y);
            return;
        };
        let vel = random_velocity(&mut self.rng, self.config.speed_range, 1.0);
        let color = ColorTag::random(&mut self.rng);
        if let Ok(ball) = Ball::new(self.next_id, pos, vel, radius) {
            self.next_id += 1;
            events.push(GameEvent::Spawned { id: ball.id });
            self.balls.push(
                ball.with_color(color)
                    .with_value(self.config.ball_value)
                    .with_lifetime(self.config.ball_lifetime),
            );
        }
    }

    /// Move balls that reached the suction point into the inventory
    fn capture_suction(&mut self, events: &mut Vec<GameEvent>) {
        let Some(point) = self.suction else {
            return;
        };
        let margin = self.config.suction.capture_margin;
        let mut kept = Vec::with_capacity(self.balls.len());
        for ball in self.balls.drain(..) {
            if distance(ball.pos, point) < ball.radius + margin {
                events.push(GameEvent::Absorbed { id: ball.id });
                self.inventory.push(ball);
            } else {
                kept.push(ball);
            }
        }
        self.balls = kept;
    }

    fn spawn(&mut self, dt: f32, arena: &Arena, events: &mut Vec<GameEvent>) {
        let live = self.balls.len();
        if !self.spawner.due(dt, live, self.state.score, &self.config)
            || live >= self.config.max_balls as usize
        {
            return;
        }
        let scale = SpawnController::speed_scale(self.state.elapsed, &self.config);
        match SpawnController::place_random(
            self.next_id,
            &mut self.rng,
            arena,
            &self.balls,
            &self.config,
            scale,
        ) {
            Ok(ball) => {
                self.next_id += 1;
                events.push(GameEvent::Spawned { id: ball.id });
                self.balls.push(ball);
            }
            Err(SimError::SpawnExhausted { attempts }) => {
                log::debug!("Spawn skipped after {attempts} attempts");
                events.push(GameEvent::SpawnSkipped { attempts });
            }
            Err(e) => log::warn!("Spawn failed: {e}"),
        }
    }

    /// Remove balls whose center entered the drain zone; returns how many
    fn drain(&mut self, events: &mut Vec<GameEvent>) -> usize {
        let Some(zone) = self.config.drain_zone else {
            return 0;
        };
        let before = self.balls.len();
        self.balls.retain(|ball| {
            if zone.contains(ball.pos) {
                events.push(GameEvent::Drained { id: ball.id });
                false
            } else {
                true
            }
        });
        let drained = before - self.balls.len();
        self.state.drained += drained as u32;
        drained
    }

    fn snapshot_with(&self, events: Vec<GameEvent>) -> Snapshot {
        Snapshot {
            phase: self.state.phase,
            score: self.state.score,
            elapsed: self.state.elapsed,
            end_reason: self.state.end_reason,
            balls: self.balls.iter().map(BallView::from).collect(),
            inventory: self.inventory.len(),
            suction: self.suction.map(|p| SuctionView {
                x: p.x,
                y: p.y,
                range: self.config.suction.range,
            }),
            drain_zone: self.config.drain_zone,
            events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollisionPolicy;
    use proptest::prelude::*;

    /// Quiet config: no initial balls, no spawning, elastic, no color mixing
    fn bare() -> SimConfig {
        SimConfig {
            initial_ball_count: 0,
            mix_colors: false,
            ..Default::default()
        }
    }

    fn started(width: f32, height: f32, config: SimConfig) -> Simulation {
        let mut sim = Simulation::new();
        sim.start(width, height, config).unwrap();
        sim
    }

    fn ball_by_id(snap: &Snapshot, id: u32) -> BallView {
        *snap.balls.iter().find(|b| b.id == id).unwrap()
    }

    #[test]
    fn test_right_wall_bounce_scenario() {
        let mut sim = started(400.0, 300.0, bare());
        let id = sim
            .insert_ball(Vec2::new(390.0, 150.0), Vec2::new(50.0, 0.0), 10.0)
            .unwrap();
        sim.step(1.0, &[]).unwrap();

        let ball = &sim.balls()[0];
        assert_eq!(ball.id, id);
        assert_eq!(ball.pos, Vec2::new(390.0, 150.0));
        assert_eq!(ball.vel, Vec2::new(-50.0, 0.0));
    }

    #[test]
    fn test_pair_overlap_separated_scenario() {
        let mut sim = started(400.0, 300.0, bare());
        sim.insert_ball(Vec2::new(100.0, 100.0), Vec2::ZERO, 5.0).unwrap();
        sim.insert_ball(Vec2::new(108.0, 100.0), Vec2::ZERO, 5.0).unwrap();
        sim.step(0.016, &[]).unwrap();

        let balls = sim.balls();
        assert_eq!(balls.len(), 2);
        assert!(balls[0].pos.distance(balls[1].pos) >= 10.0);
    }

    #[test]
    fn test_start_five_balls_scenario() {
        let config = SimConfig {
            initial_ball_count: 5,
            seed: 77,
            ..Default::default()
        };
        let sim = started(500.0, 500.0, config);
        let arena = *sim.arena().unwrap();
        let balls = sim.balls();
        assert_eq!(balls.len(), 5);
        for (i, a) in balls.iter().enumerate() {
            assert!(arena.contains_circle(a.pos, a.radius));
            for b in &balls[i + 1..] {
                assert!(!a.overlaps(b));
            }
        }
    }

    #[test]
    fn test_pop_hit_and_miss_scenario() {
        let mut sim = started(400.0, 300.0, bare());
        let id = sim.insert_ball(Vec2::new(100.0, 100.0), Vec2::ZERO, 10.0).unwrap();
        sim.insert_ball(Vec2::new(300.0, 200.0), Vec2::ZERO, 10.0).unwrap();

        let miss = sim.step(0.01, &[InputCommand::PopAt { x: 200.0, y: 50.0 }]).unwrap();
        assert_eq!(miss.balls.len(), 2);
        assert_eq!(miss.score, 0);

        let hit = sim.step(0.01, &[InputCommand::PopAt { x: 103.0, y: 98.0 }]).unwrap();
        assert_eq!(hit.balls.len(), 1);
        assert_eq!(hit.score, sim.config().ball_value as u64);
        assert!(hit.balls.iter().all(|b| b.id != id));
        assert!(hit.events.contains(&GameEvent::Popped { id, value: 1 }));
    }

    #[test]
    fn test_pop_takes_topmost() {
        let lower = Ball::new(1, Vec2::new(100.0, 100.0), Vec2::ZERO, 30.0).unwrap();
        let upper = Ball::new(2, Vec2::new(110.0, 100.0), Vec2::ZERO, 30.0).unwrap();
        let far = Ball::new(3, Vec2::new(300.0, 100.0), Vec2::ZERO, 5.0).unwrap();
        let balls = [lower, upper, far];
        assert_eq!(topmost_at(&balls, Vec2::new(105.0, 100.0)), Some(1));
        assert_eq!(topmost_at(&balls, Vec2::new(75.0, 100.0)), Some(0));
        assert_eq!(topmost_at(&balls, Vec2::new(200.0, 200.0)), None);
    }

    #[test]
    fn test_step_before_start_fails() {
        let mut sim = Simulation::new();
        assert_eq!(
            sim.step(0.016, &[]),
            Err(SimError::InvalidStateTransition {
                from: GamePhase::NotStarted,
                op: "step"
            })
        );
    }

    #[test]
    fn test_invalid_time_steps() {
        let mut sim = started(400.0, 300.0, bare());
        assert_eq!(sim.step(-0.1, &[]), Err(SimError::InvalidTimeStep(-0.1)));
        assert!(matches!(sim.step(f32::NAN, &[]), Err(SimError::InvalidTimeStep(_))));
        assert!(matches!(sim.step(5.0, &[]), Err(SimError::InvalidTimeStep(_))));
        assert!(sim.step(1.0, &[]).is_ok());
    }

    #[test]
    fn test_start_rejects_bad_arena_and_double_start() {
        let mut sim = Simulation::new();
        assert!(matches!(
            sim.start(0.0, 100.0, bare()),
            Err(SimError::InvalidGeometry(_))
        ));
        assert!(matches!(
            sim.start(20.0, 20.0, SimConfig::default()),
            Err(SimError::InvalidGeometry(_))
        ));
        sim.start(400.0, 300.0, bare()).unwrap();
        assert!(matches!(
            sim.start(400.0, 300.0, bare()),
            Err(SimError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_pause_resume_cycle() {
        let mut sim = started(400.0, 300.0, bare());
        sim.insert_ball(Vec2::new(100.0, 100.0), Vec2::new(10.0, 0.0), 5.0).unwrap();

        sim.pause().unwrap();
        assert_eq!(sim.phase(), GamePhase::Paused);
        assert!(matches!(
            sim.step(0.1, &[]),
            Err(SimError::InvalidStateTransition { from: GamePhase::Paused, .. })
        ));
        assert!(sim.pause().is_err());
        assert_eq!(sim.balls()[0].pos, Vec2::new(100.0, 100.0));

        sim.resume().unwrap();
        sim.step(0.1, &[]).unwrap();
        assert!(sim.balls()[0].pos.x > 100.0);
    }

    #[test]
    fn test_pause_and_resume_commands() {
        let mut sim = started(400.0, 300.0, bare());
        sim.insert_ball(Vec2::new(100.0, 100.0), Vec2::new(10.0, 0.0), 5.0).unwrap();

        let snap = sim.step(0.1, &[InputCommand::Pause]).unwrap();
        assert_eq!(snap.phase, GamePhase::Paused);
        assert_eq!(snap.balls[0].x, 100.0);

        let snap = sim.step(0.1, &[InputCommand::Resume]).unwrap();
        assert_eq!(snap.phase, GamePhase::Running);
        assert!(snap.balls[0].x > 100.0);
    }

    #[test]
    fn test_quit_ends_and_freezes() {
        let mut sim = started(400.0, 300.0, bare());
        sim.insert_ball(Vec2::new(100.0, 100.0), Vec2::new(10.0, 0.0), 5.0).unwrap();
        let snap = sim.step(0.1, &[InputCommand::Quit]).unwrap();
        assert_eq!(snap.phase, GamePhase::Ended);
        assert_eq!(snap.end_reason, Some(EndReason::Quit));

        let frozen = sim.step(0.5, &[InputCommand::PopAt { x: 100.0, y: 100.0 }]).unwrap();
        assert_eq!(frozen.balls, snap.balls);
        assert_eq!(frozen.score, snap.score);
        assert!(sim.quit().is_err());

        // A finished game can be restarted
        assert!(sim.start(400.0, 300.0, bare()).is_ok());
        assert_eq!(sim.phase(), GamePhase::Running);
    }

    #[test]
    fn test_ended_game_ignores_time_step() {
        let mut sim = started(400.0, 300.0, bare());
        sim.insert_ball(Vec2::new(100.0, 100.0), Vec2::new(10.0, 0.0), 5.0).unwrap();
        let last = sim.step(0.1, &[InputCommand::Quit]).unwrap();

        assert_eq!(sim.step(-1.0, &[]), Ok(last.clone()));
        assert_eq!(sim.step(f32::NAN, &[]), Ok(last.clone()));
        assert_eq!(sim.step(60.0, &[]), Ok(last));
    }

    #[test]
    fn test_insert_ball_needs_live_game() {
        let mut sim = Simulation::new();
        assert!(matches!(
            sim.insert_ball(Vec2::new(50.0, 50.0), Vec2::ZERO, 5.0),
            Err(SimError::InvalidStateTransition { from: GamePhase::NotStarted, .. })
        ));

        let mut sim = started(400.0, 300.0, bare());
        sim.pause().unwrap();
        assert!(sim.insert_ball(Vec2::new(50.0, 50.0), Vec2::ZERO, 5.0).is_ok());
        sim.quit().unwrap();
        let before = sim.snapshot();
        assert!(matches!(
            sim.insert_ball(Vec2::new(200.0, 200.0), Vec2::ZERO, 5.0),
            Err(SimError::InvalidStateTransition { from: GamePhase::Ended, .. })
        ));
        assert_eq!(sim.snapshot(), before);
    }

    #[test]
    fn test_pair_pinned_on_wall_never_overlaps() {
        let mut sim = started(300.0, 200.0, bare());
        sim.insert_ball(Vec2::new(10.0, 50.0), Vec2::new(-30.0, 0.0), 10.0).unwrap();
        sim.insert_ball(Vec2::new(15.0, 50.0), Vec2::ZERO, 10.0).unwrap();

        for _ in 0..30 {
            sim.step(1.0 / 60.0, &[]).unwrap();
            let balls = sim.balls();
            for (i, a) in balls.iter().enumerate() {
                for b in &balls[i + 1..] {
                    assert!(!a.overlaps(b), "{} and {} overlap", a.id, b.id);
                }
            }
        }
    }

    #[test]
    fn test_state_carries_seed() {
        let config = SimConfig {
            seed: 4242,
            initial_ball_count: 6,
            ..Default::default()
        };
        let mut sim = Simulation::new();
        let state = sim.start(500.0, 400.0, config.clone()).unwrap();
        assert_eq!(state.rng, RngState::new(4242));

        let json = serde_json::to_string(sim.state()).unwrap();
        let restored: GameState = serde_json::from_str(&json).unwrap();
        let replay = started(
            500.0,
            400.0,
            SimConfig {
                seed: restored.rng.seed,
                ..config
            },
        );
        assert_eq!(replay.balls(), sim.balls());
    }

    #[test]
    fn test_win_by_score() {
        let config = SimConfig {
            win_score: Some(2),
            ..bare()
        };
        let mut sim = started(400.0, 300.0, config);
        sim.insert_ball(Vec2::new(50.0, 50.0), Vec2::ZERO, 10.0).unwrap();
        sim.insert_ball(Vec2::new(150.0, 50.0), Vec2::ZERO, 10.0).unwrap();
        let snap = sim
            .step(
                0.01,
                &[
                    InputCommand::PopAt { x: 50.0, y: 50.0 },
                    InputCommand::PopAt { x: 150.0, y: 50.0 },
                ],
            )
            .unwrap();
        assert_eq!(snap.phase, GamePhase::Ended);
        assert_eq!(snap.end_reason, Some(EndReason::Won));
        assert!(snap.events.contains(&GameEvent::Ended { reason: EndReason::Won }));
    }

    #[test]
    fn test_lose_by_timeout() {
        let config = SimConfig {
            lose_timeout: Some(1.0),
            ..bare()
        };
        let mut sim = started(400.0, 300.0, config);
        let snap = sim.step(0.5, &[]).unwrap();
        assert_eq!(snap.phase, GamePhase::Running);
        let snap = sim.step(0.5, &[]).unwrap();
        assert_eq!(snap.end_reason, Some(EndReason::Lost));
    }

    #[test]
    fn test_drain_zone_removes_and_loses() {
        let config = SimConfig {
            drain_zone: Some(Rect::new(300.0, 0.0, 100.0, 100.0)),
            lose_on_drain: true,
            ..bare()
        };
        let mut sim = started(400.0, 300.0, config);
        let id = sim.insert_ball(Vec2::new(280.0, 50.0), Vec2::new(40.0, 0.0), 5.0).unwrap();
        let snap = sim.step(1.0, &[]).unwrap();
        assert!(snap.balls.is_empty());
        assert!(snap.events.contains(&GameEvent::Drained { id }));
        assert_eq!(snap.end_reason, Some(EndReason::Lost));
        assert_eq!(sim.state().drained, 1);
    }

    #[test]
    fn test_clear_to_win() {
        let config = SimConfig {
            clear_to_win: true,
            ..bare()
        };
        let mut sim = started(400.0, 300.0, config);
        sim.insert_ball(Vec2::new(50.0, 50.0), Vec2::ZERO, 10.0).unwrap();
        let snap = sim.step(0.01, &[]).unwrap();
        assert_eq!(snap.phase, GamePhase::Running);
        let snap = sim.step(0.01, &[InputCommand::PopAt { x: 50.0, y: 50.0 }]).unwrap();
        assert_eq!(snap.end_reason, Some(EndReason::Won));
    }

    #[test]
    fn test_destructive_policy_step() {
        let config = SimConfig {
            collision_policy: CollisionPolicy::Destructive,
            ..bare()
        };
        let mut sim = started(400.0, 300.0, config);
        sim.insert_ball(Vec2::new(100.0, 100.0), Vec2::new(10.0, 0.0), 5.0).unwrap();
        sim.insert_ball(Vec2::new(112.0, 100.0), Vec2::new(-10.0, 0.0), 5.0).unwrap();
        sim.insert_ball(Vec2::new(300.0, 200.0), Vec2::ZERO, 5.0).unwrap();
        let snap = sim.step(0.2, &[]).unwrap();
        assert_eq!(snap.balls.len(), 1);
        assert_eq!(snap.score, 2);
    }

    #[test]
    fn test_merge_policy_step() {
        let config = SimConfig {
            collision_policy: CollisionPolicy::Merge,
            ..bare()
        };
        let mut sim = started(400.0, 300.0, config);
        let a = sim.insert_ball(Vec2::new(100.0, 100.0), Vec2::ZERO, 6.0).unwrap();
        sim.insert_ball(Vec2::new(108.0, 100.0), Vec2::ZERO, 8.0).unwrap();
        let snap = sim.step(0.01, &[]).unwrap();
        assert_eq!(snap.balls.len(), 1);
        let merged = ball_by_id(&snap, a);
        assert!((merged.radius - 10.0).abs() < 1e-4);
        assert_eq!(snap.score, 1);
        assert!(snap.events.contains(&GameEvent::Merged { survivor: a, absorbed: a + 1 }));
    }

    #[test]
    fn test_suction_absorbs_and_eject_returns() {
        let mut sim = started(400.0, 300.0, bare());
        let id = sim.insert_ball(Vec2::new(200.0, 200.0), Vec2::ZERO, 10.0).unwrap();

        let snap = sim
            .step(0.01, &[InputCommand::SuctionStart { x: 205.0, y: 200.0 }])
            .unwrap();
        assert!(snap.balls.is_empty());
        assert_eq!(snap.inventory, 1);
        assert!(snap.suction.is_some());
        assert!(snap.events.contains(&GameEvent::Absorbed { id }));

        let snap = sim
            .step(
                0.01,
                &[InputCommand::SuctionStop, InputCommand::Eject { x: 50.0, y: 60.0 }],
            )
            .unwrap();
        assert_eq!(snap.inventory, 0);
        assert!(snap.suction.is_none());
        let ball = ball_by_id(&snap, id);
        assert_eq!((ball.x, ball.y), (50.0, 60.0));
        assert!(sim.balls()[0].vel.length() >= sim.config().eject_speed_range.0 - 1e-3);
    }

    #[test]
    fn test_suction_pulls_toward_pointer() {
        let mut sim = started(400.0, 300.0, bare());
        sim.insert_ball(Vec2::new(250.0, 200.0), Vec2::ZERO, 10.0).unwrap();
        sim.step(0.1, &[InputCommand::SuctionStart { x: 200.0, y: 200.0 }]).unwrap();
        assert_eq!(sim.balls().len(), 1);
        sim.step(0.1, &[]).unwrap();
        let ball = &sim.balls()[0];
        assert!(ball.vel.x < 0.0);
        assert!(ball.vel.y.abs() < 1e-4);
    }

    #[test]
    fn test_eject_with_empty_inventory_is_noop() {
        let mut sim = started(400.0, 300.0, bare());
        let snap = sim.step(0.01, &[InputCommand::Eject { x: 50.0, y: 50.0 }]).unwrap();
        assert!(snap.balls.is_empty());
        assert!(snap.events.is_empty());
    }

    #[test]
    fn test_add_ball_respects_occupancy() {
        let mut sim = started(400.0, 300.0, bare());
        let snap = sim.step(0.01, &[InputCommand::AddBall { x: 100.0, y: 100.0 }]).unwrap();
        assert_eq!(snap.balls.len(), 1);
        // Same spot is now taken (the first ball barely moved)
        let snap = sim.step(0.0, &[InputCommand::AddBall { x: 100.0, y: 100.0 }]).unwrap();
        assert_eq!(snap.balls.len(), 1);
    }

    #[test]
    fn test_lifetime_expiry() {
        let config = SimConfig {
            ball_lifetime: Some(0.5),
            ..bare()
        };
        let mut sim = started(400.0, 300.0, config);
        let id = sim.insert_ball(Vec2::new(100.0, 100.0), Vec2::ZERO, 10.0).unwrap();
        sim.step(0.3, &[]).unwrap();
        assert_eq!(sim.balls().len(), 1);
        let snap = sim.step(0.3, &[]).unwrap();
        assert!(snap.balls.is_empty());
        assert!(snap.events.contains(&GameEvent::Expired { id }));
        assert_eq!(snap.score, 0);
    }

    #[test]
    fn test_timed_spawning_until_target() {
        let config = SimConfig {
            initial_ball_count: 2,
            spawn_interval: Some(0.5),
            ..bare()
        };
        let mut sim = started(600.0, 600.0, config);
        sim.balls.clear();
        let mut spawned = 0;
        for _ in 0..10 {
            let snap = sim.step(0.25, &[]).unwrap();
            spawned += snap
                .events
                .iter()
                .filter(|e| matches!(e, GameEvent::Spawned { .. }))
                .count();
        }
        assert_eq!(spawned, 2);
        assert_eq!(sim.balls().len(), 2);
    }

    #[test]
    fn test_zero_step_is_a_read() {
        let mut sim = started(
            500.0,
            500.0,
            SimConfig {
                initial_ball_count: 8,
                seed: 3,
                ..Default::default()
            },
        );
        sim.step(0.1, &[]).unwrap();
        let before = sim.snapshot();
        let after = sim.step(0.0, &[]).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut sim = started(400.0, 300.0, bare());
        sim.insert_ball(Vec2::new(100.0, 100.0), Vec2::new(10.0, 0.0), 5.0).unwrap();
        let snap = sim.step(0.1, &[]).unwrap();
        sim.step(0.1, &[]).unwrap();
        assert!((snap.balls[0].x - 101.0).abs() < 1e-4);
        assert!(sim.balls()[0].pos.x > snap.balls[0].x);
        let json = serde_json::to_string(&snap).unwrap();
        assert!(json.contains("\"phase\":\"Running\""));
    }

    #[test]
    fn test_determinism() {
        let config = SimConfig {
            seed: 99999,
            initial_ball_count: 12,
            spawn_interval: Some(0.3),
            max_balls: 20,
            ..Default::default()
        };
        let script = |i: usize| -> Vec<InputCommand> {
            match i {
                10 => vec![InputCommand::PopAt { x: 200.0, y: 200.0 }],
                20 => vec![InputCommand::SuctionStart { x: 300.0, y: 150.0 }],
                40 => vec![InputCommand::SuctionStop, InputCommand::Eject { x: 100.0, y: 100.0 }],
                50 => vec![InputCommand::AddBall { x: 250.0, y: 250.0 }],
                _ => Vec::new(),
            }
        };

        let mut a = started(500.0, 400.0, config.clone());
        let mut b = started(500.0, 400.0, config);
        for i in 0..120 {
            let sa = a.step(1.0 / 60.0, &script(i)).unwrap();
            let sb = b.step(1.0 / 60.0, &script(i)).unwrap();
            assert_eq!(sa, sb, "diverged at step {i}");
        }
    }

    fn total_energy(sim: &Simulation) -> f32 {
        sim.balls().iter().map(Ball::kinetic_energy).sum()
    }

    proptest! {
        #[test]
        fn prop_free_flight_is_exact_integration(
            x in 300.0f32..700.0,
            y in 300.0f32..700.0,
            vx in -100.0f32..100.0,
            vy in -100.0f32..100.0,
            r in 1.0f32..20.0,
            dt in 0.0f32..0.5,
        ) {
            let mut sim = started(1000.0, 1000.0, bare());
            sim.insert_ball(Vec2::new(x, y), Vec2::new(vx, vy), r).unwrap();
            let old = sim.balls()[0].clone();
            sim.step(dt, &[]).unwrap();
            let ball = &sim.balls()[0];
            prop_assert_eq!(ball.pos, old.pos + old.vel * dt);
            prop_assert_eq!(ball.vel, old.vel);
        }

        #[test]
        fn prop_balls_stay_inside(seed in any::<u64>(), steps in 1usize..60) {
            let config = SimConfig { seed, initial_ball_count: 15, ..Default::default() };
            let mut sim = started(300.0, 200.0, config);
            let arena = *sim.arena().unwrap();
            for _ in 0..steps {
                sim.step(1.0 / 30.0, &[]).unwrap();
                for b in sim.balls() {
                    prop_assert!(b.pos.x - b.radius >= -1e-3);
                    prop_assert!(b.pos.y - b.radius >= -1e-3);
                    prop_assert!(b.pos.x + b.radius <= arena.width() + 1e-3);
                    prop_assert!(b.pos.y + b.radius <= arena.height() + 1e-3);
                }
            }
        }

        #[test]
        fn prop_elastic_conserves_energy(seed in any::<u64>()) {
            let config = SimConfig { seed, initial_ball_count: 10, ..bare() };
            let mut sim = started(250.0, 250.0, config);
            let before = total_energy(&sim);
            for _ in 0..30 {
                sim.step(1.0 / 60.0, &[]).unwrap();
            }
            let after = total_energy(&sim);
            prop_assert!((after - before).abs() <= before * 1e-3);
        }

        #[test]
        fn prop_zero_step_idempotent(seed in any::<u64>(), warmup in 0usize..20) {
            let config = SimConfig { seed, initial_ball_count: 10, ..Default::default() };
            let mut sim = started(400.0, 400.0, config);
            for _ in 0..warmup {
                sim.step(1.0 / 60.0, &[]).unwrap();
            }
            let before = sim.snapshot();
            let after = sim.step(0.0, &[]).unwrap();
            prop_assert_eq!(before.balls, after.balls);
            prop_assert_eq!(before.score, after.score);
            prop_assert_eq!(before.phase, after.phase);
        }

        #[test]
        fn prop_destructive_shrinks_and_scores(seed in any::<u64>()) {
            let config = SimConfig {
                seed,
                initial_ball_count: 0,
                collision_policy: CollisionPolicy::Destructive,
                ..Default::default()
            };
            let mut sim = started(400.0, 400.0, config);
            sim.insert_ball(Vec2::new(200.0, 200.0), Vec2::ZERO, 10.0).unwrap();
            sim.insert_ball(Vec2::new(210.0, 205.0), Vec2::ZERO, 10.0).unwrap();
            let snap = sim.step(1.0 / 60.0, &[]).unwrap();
            prop_assert!(snap.balls.len() < 2);
            prop_assert!(snap.score > 0);
        }
    }
}
