//! Collision detection
//!
//! Pure queries over the ball set: nothing here mutates a ball. Events come
//! out in a fixed order (ball id ascending, each ball's wall hits before its
//! pair hits) so the resolver replays identically given identical input.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::ball::{Arena, Ball};

/// Arena edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WallSide {
    Left,
    Right,
    Top,
    Bottom,
}

impl WallSide {
    /// Unit normal pointing back into the arena
    pub fn inward_normal(self) -> Vec2 {
        match self {
            WallSide::Left => Vec2::X,
            WallSide::Right => Vec2::NEG_X,
            WallSide::Top => Vec2::Y,
            WallSide::Bottom => Vec2::NEG_Y,
        }
    }
}

/// One overlap found this step
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CollisionEvent {
    Wall {
        ball: u32,
        side: WallSide,
        penetration: f32,
    },
    Pair {
        a: u32,
        b: u32,
        penetration: f32,
        /// Unit contact normal pointing from `a` toward `b`
        normal: Vec2,
    },
}

/// Wall hits for a single ball, in Left, Right, Top, Bottom order
pub fn wall_hits(ball: &Ball, arena: &Arena) -> impl Iterator<Item = CollisionEvent> {
    let (pos, r) = ball.bounds();
    let id = ball.id;
    [
        (WallSide::Left, r - pos.x),
        (WallSide::Right, pos.x + r - arena.width()),
        (WallSide::Top, r - pos.y),
        (WallSide::Bottom, pos.y + r - arena.height()),
    ]
    .into_iter()
    .filter(|&(_, penetration)| penetration > 0.0)
    .map(move |(side, penetration)| CollisionEvent::Wall {
        ball: id,
        side,
        penetration,
    })
}

/// Check a pair of balls for true overlap
///
/// Coincident centers get a `+X` normal so separation still has a direction.
pub fn ball_pair_hit(a: &Ball, b: &Ball) -> Option<CollisionEvent> {
    let delta = b.pos - a.pos;
    let dist = delta.length();
    let reach = a.radius + b.radius;
    if dist >= reach {
        return None;
    }
    let normal = if dist > 0.0 { delta / dist } else { Vec2::X };
    Some(CollisionEvent::Pair {
        a: a.id,
        b: b.id,
        penetration: reach - dist,
        normal,
    })
}

/// Find every overlap for the current step
///
/// `balls` must be sorted by id. Each unordered pair is tested exactly once.
pub fn detect(balls: &[Ball], arena: &Arena) -> Vec<CollisionEvent> {
    let mut events = Vec::new();
    for (i, ball) in balls.iter().enumerate() {
        events.extend(wall_hits(ball, arena));
        for other in &balls[i + 1..] {
            if let Some(hit) = ball_pair_hit(ball, other) {
                events.push(hit);
            }
        }
    }
    events
}

/// Wall-only pass, used for the final containment clamp
pub fn detect_walls(balls: &[Ball], arena: &Arena) -> Vec<CollisionEvent> {
    balls.iter().flat_map(|b| wall_hits(b, arena)).collect()
}
