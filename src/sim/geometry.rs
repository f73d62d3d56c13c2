//! 2D geometry helpers on top of `glam::Vec2`
//!
//! Vector add/sub/scale/dot/length come straight from glam. Zero-length
//! vectors normalize to `Vec2::ZERO`; nothing here fails.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Distance between two points
#[inline]
pub fn distance(a: Vec2, b: Vec2) -> f32 {
    (b - a).length()
}

/// Unit vector in the direction of `v`, or zero if `v` has no length
#[inline]
pub fn normalize(v: Vec2) -> Vec2 {
    v.normalize_or_zero()
}

/// Reflect a vector about a unit normal
///
/// Standard reflection: v' = v - 2(v·n)n
#[inline]
pub fn reflect(v: Vec2, normal: Vec2) -> Vec2 {
    v - 2.0 * v.dot(normal) * normal
}

/// Axis-aligned rectangle (min corner inclusive, max corner inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            min: Vec2::new(x, y),
            max: Vec2::new(x + width, y + height),
        }
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    #[inline]
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// True if a circle overlaps the rectangle
    pub fn intersects_circle(&self, center: Vec2, radius: f32) -> bool {
        let closest = center.clamp(self.min, self.max);
        (center - closest).length_squared() < radius * radius
    }
}
