//! Ball entity and the arena it lives in

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::error::SimError;
use super::geometry::{Rect, distance};
use crate::consts::{BALL_VALUE, COLOR_MIN_CHANNEL};

/// Fixed rectangular play area, origin top-left, y pointing down
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Arena {
    width: f32,
    height: f32,
}

impl Arena {
    pub fn new(width: f32, height: f32) -> Result<Self, SimError> {
        if !(width.is_finite() && width > 0.0 && height.is_finite() && height > 0.0) {
            return Err(SimError::InvalidGeometry(format!(
                "arena must be positive, got {width}x{height}"
            )));
        }
        Ok(Self { width, height })
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }

    /// True if the whole circle lies inside the arena
    pub fn contains_circle(&self, center: Vec2, radius: f32) -> bool {
        center.x - radius >= 0.0
            && center.x + radius <= self.width
            && center.y - radius >= 0.0
            && center.y + radius <= self.height
    }

    /// Nearest center that keeps a circle of `radius` inside
    pub fn clamp_center(&self, center: Vec2, radius: f32) -> Vec2 {
        Vec2::new(
            center.x.max(radius).min(self.width - radius),
            center.y.max(radius).min(self.height - radius),
        )
    }

    /// Largest radius a ball can have and still fit
    pub fn max_radius(&self) -> f32 {
        self.width.min(self.height) / 2.0
    }
}

/// RGB color tag carried by a ball; the presentation layer decides how to draw it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColorTag(pub [u8; 3]);

impl ColorTag {
    pub const WHITE: ColorTag = ColorTag([255, 255, 255]);

    /// Random color with every channel at least `COLOR_MIN_CHANNEL`
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        ColorTag([
            rng.random_range(COLOR_MIN_CHANNEL..=255),
            rng.random_range(COLOR_MIN_CHANNEL..=255),
            rng.random_range(COLOR_MIN_CHANNEL..=255),
        ])
    }

    /// Blend two colors 60/40, pulling washed-out results back toward a hue
    pub fn mix(a: ColorTag, b: ColorTag) -> ColorTag {
        let blend = |x: u8, y: u8| (x as f32 * 0.6 + y as f32 * 0.4) as u8;
        let mut r = blend(a.0[0], b.0[0]);
        let mut g = blend(a.0[1], b.0[1]);
        let mut bl = blend(a.0[2], b.0[2]);

        let brightness = (r as u32 + g as u32 + bl as u32) / 3;
        if brightness > 200 {
            let dim = |c: u8| c.saturating_sub(50).max(COLOR_MIN_CHANNEL);
            if r > g && r > bl {
                g = dim(g);
                bl = dim(bl);
            } else if g > r && g > bl {
                r = dim(r);
                bl = dim(bl);
            } else {
                r = dim(r);
                g = dim(g);
            }
        }
        ColorTag([r, g, bl])
    }
}

impl Default for ColorTag {
    fn default() -> Self {
        ColorTag::WHITE
    }
}

/// A ball entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ball {
    pub id: u32,
    pub pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
    pub color: ColorTag,
    /// Score awarded when this ball is popped or destroyed
    pub value: u32,
    /// Remaining lifetime in seconds (None = lives forever)
    pub lifetime: Option<f32>,
}

impl Ball {
    pub fn new(id: u32, pos: Vec2, vel: Vec2, radius: f32) -> Result<Self, SimError> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(SimError::InvalidGeometry(format!(
                "ball radius must be positive, got {radius}"
            )));
        }
        Ok(Self {
            id,
            pos,
            vel,
            radius,
            color: ColorTag::default(),
            value: BALL_VALUE,
            lifetime: None,
        })
    }

    pub fn with_color(mut self, color: ColorTag) -> Self {
        self.color = color;
        self
    }

    pub fn with_value(mut self, value: u32) -> Self {
        self.value = value;
        self
    }

    pub fn with_lifetime(mut self, lifetime: Option<f32>) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Integrate position by one step (no collision awareness)
    #[inline]
    pub fn advance(&mut self, dt: f32) {
        self.pos += self.vel * dt;
    }

    /// Bounding circle used by the collision detector
    #[inline]
    pub fn bounds(&self) -> (Vec2, f32) {
        (self.pos, self.radius)
    }

    /// Point-in-circle test (boundary counts as inside)
    pub fn contains_point(&self, p: Vec2) -> bool {
        (p - self.pos).length_squared() <= self.radius * self.radius
    }

    /// True overlap; touching circles do not count
    pub fn overlaps(&self, other: &Ball) -> bool {
        distance(self.pos, other.pos) < self.radius + other.radius
    }

    /// Unit-mass kinetic energy
    pub fn kinetic_energy(&self) -> f32 {
        0.5 * self.vel.length_squared()
    }

    /// Area-proportional mass (only merging uses it)
    pub fn mass(&self) -> f32 {
        self.radius * self.radius
    }

    /// Count down lifetime, returning true once it has run out
    pub fn tick_lifetime(&mut self, dt: f32) -> bool {
        match self.lifetime.as_mut() {
            Some(remaining) => {
                *remaining -= dt;
                *remaining <= 0.0
            }
            None => false,
        }
    }
}
