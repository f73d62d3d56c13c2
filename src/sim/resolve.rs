//! Collision response
//!
//! Applies detector events in the order they were emitted. Wall contacts
//! always bounce; ball-ball contacts follow the configured `CollisionPolicy`.

use glam::Vec2;

use super::ball::{Arena, Ball, ColorTag};
use super::collision::{CollisionEvent, WallSide, detect, detect_walls};
use super::geometry::{distance, normalize};
use super::state::GameEvent;
use crate::config::CollisionPolicy;
use crate::consts::{MAX_RESOLUTION_PASSES, SEPARATION_SLOP};

/// Resolver knobs taken from `SimConfig`
#[derive(Debug, Clone, Copy)]
pub struct ResolveOptions {
    pub policy: CollisionPolicy,
    pub wall_restitution: f32,
    pub mix_colors: bool,
    /// Merged balls never grow past this
    pub max_radius: f32,
}

/// Outcome of one or more resolution passes
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub score: u64,
    pub removed: Vec<u32>,
    pub events: Vec<GameEvent>,
    pub passes: usize,
}

impl Resolution {
    fn absorb(&mut self, other: Resolution) {
        self.score += other.score;
        self.removed.extend(other.removed);
        self.events.extend(other.events);
    }
}

/// Index of a live ball (`balls` sorted by id)
#[inline]
pub fn index_of(balls: &[Ball], id: u32) -> Option<usize> {
    balls.binary_search_by_key(&id, |b| b.id).ok()
}

fn pair_mut(balls: &mut [Ball], i: usize, j: usize) -> (&mut Ball, &mut Ball) {
    debug_assert!(i < j);
    let (lo, hi) = balls.split_at_mut(j);
    (&mut lo[i], &mut hi[0])
}

fn side_penetration(ball: &Ball, side: WallSide, arena: &Arena) -> f32 {
    match side {
        WallSide::Left => ball.radius - ball.pos.x,
        WallSide::Right => ball.pos.x + ball.radius - arena.width(),
        WallSide::Top => ball.radius - ball.pos.y,
        WallSide::Bottom => ball.pos.y + ball.radius - arena.height(),
    }
}

/// Bounce a ball off one wall and push it back inside
///
/// Only a velocity component heading into the wall is reflected, so
/// resolving the same contact twice is harmless.
pub fn resolve_wall(ball: &mut Ball, side: WallSide, arena: &Arena, restitution: f32) {
    let normal = side.inward_normal();
    let vn = ball.vel.dot(normal);
    if vn < 0.0 {
        // restitution 1.0 reduces to v' = v - 2(v·n)n
        ball.vel -= (1.0 + restitution) * vn * normal;
    }
    let penetration = side_penetration(ball, side, arena);
    if penetration > 0.0 {
        ball.pos += normal * penetration;
    }
}

/// Push two overlapping balls apart along `normal`, keeping both inside
///
/// Each ball takes half the overlap. When a wall stops one of them short,
/// the other takes what is left.
fn separate(a: &mut Ball, b: &mut Ball, normal: Vec2, overlap: f32, arena: &Arena) {
    let half = normal * ((overlap + SEPARATION_SLOP) * 0.5);
    a.pos = arena.clamp_center(a.pos - half, a.radius);
    b.pos = arena.clamp_center(b.pos + half, b.radius);

    let reach = a.radius + b.radius;
    let gap = distance(a.pos, b.pos);
    if gap >= reach {
        return;
    }
    let mut dir = normalize(b.pos - a.pos);
    if dir == Vec2::ZERO {
        dir = normal;
    }
    b.pos = arena.clamp_center(b.pos + dir * (reach - gap + SEPARATION_SLOP), b.radius);
    let gap = distance(a.pos, b.pos);
    if gap < reach {
        a.pos = arena.clamp_center(a.pos - dir * (reach - gap + SEPARATION_SLOP), a.radius);
    }
}

/// Equal-mass elastic bounce plus positional separation
pub fn resolve_elastic(a: &mut Ball, b: &mut Ball, arena: &Arena, mix_colors: bool) {
    let delta = b.pos - a.pos;
    let dist = delta.length();
    let reach = a.radius + b.radius;
    if dist >= reach {
        return;
    }
    let normal = if dist > 0.0 { delta / dist } else { Vec2::X };

    let va_n = a.vel.dot(normal);
    let vb_n = b.vel.dot(normal);
    if vb_n - va_n < 0.0 {
        // Swap the normal components; tangential parts are untouched
        a.vel += (vb_n - va_n) * normal;
        b.vel += (va_n - vb_n) * normal;
    }

    separate(a, b, normal, reach - dist, arena);

    if mix_colors {
        let mixed = ColorTag::mix(a.color, b.color);
        a.color = mixed;
        b.color = mixed;
    }
}

/// Fold `b` into `a`, conserving area and momentum
pub fn merge_into(a: &mut Ball, b: &Ball, max_radius: f32) {
    let (ma, mb) = (a.mass(), b.mass());
    let total = ma + mb;
    a.pos = (a.pos * ma + b.pos * mb) / total;
    a.vel = (a.vel * ma + b.vel * mb) / total;
    a.radius = total.sqrt().min(max_radius);
    a.value += b.value;
    a.color = ColorTag::mix(a.color, b.color);
    a.lifetime = match (a.lifetime, b.lifetime) {
        (Some(x), Some(y)) => Some(x.max(y)),
        _ => None,
    };
}

/// Apply one pass of events
///
/// Events that name a ball already removed in this pass are skipped.
/// Removed balls are dropped from `balls` before returning.
pub fn resolve(
    events: &[CollisionEvent],
    balls: &mut Vec<Ball>,
    arena: &Arena,
    opts: &ResolveOptions,
) -> Resolution {
    let mut out = Resolution {
        passes: 1,
        ..Default::default()
    };

    for event in events {
        match *event {
            CollisionEvent::Wall { ball, side, .. } => {
                if out.removed.contains(&ball) {
                    continue;
                }
                if let Some(i) = index_of(balls, ball) {
                    resolve_wall(&mut balls[i], side, arena, opts.wall_restitution);
                }
            }
            CollisionEvent::Pair { a, b, .. } => {
                if out.removed.contains(&a) || out.removed.contains(&b) {
                    continue;
                }
                let (Some(ia), Some(ib)) = (index_of(balls, a), index_of(balls, b)) else {
                    continue;
                };
                let (ball_a, ball_b) = pair_mut(balls, ia, ib);
                match opts.policy {
                    CollisionPolicy::Elastic => {
                        resolve_elastic(ball_a, ball_b, arena, opts.mix_colors)
                    }
                    CollisionPolicy::Destructive => {
                        out.score += ball_a.value as u64 + ball_b.value as u64;
                        out.removed.extend([a, b]);
                        out.events.push(GameEvent::Destroyed {
                            id: a,
                            value: ball_a.value,
                        });
                        out.events.push(GameEvent::Destroyed {
                            id: b,
                            value: ball_b.value,
                        });
                    }
                    CollisionPolicy::Merge => {
                        out.score += ball_b.value as u64;
                        merge_into(ball_a, ball_b, opts.max_radius);
                        out.removed.push(b);
                        out.events.push(GameEvent::Merged {
                            survivor: a,
                            absorbed: b,
                        });
                    }
                }
            }
        }
    }

    if !out.removed.is_empty() {
        balls.retain(|ball| !out.removed.contains(&ball.id));
    }
    out
}

/// Detect and resolve until nothing overlaps or the pass budget runs out,
/// then clamp every ball inside the arena
pub fn resolve_all(balls: &mut Vec<Ball>, arena: &Arena, opts: &ResolveOptions) -> Resolution {
    let mut total = Resolution::default();
    for _ in 0..MAX_RESOLUTION_PASSES {
        let events = detect(balls, arena);
        if events.is_empty() {
            break;
        }
        let pass = resolve(&events, balls, arena, opts);
        total.passes += 1;
        total.absorb(pass);
    }

    let walls = detect_walls(balls, arena);
    if !walls.is_empty() {
        total.absorb(resolve(&walls, balls, arena, opts));
    }
    total
}
