use std::f32::consts::TAU;

use crate::render::normalize_angle;

/// Accumulated rotation of the quad.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Spin {
    angle: f32,
    /// Radians per second. Negative spins clockwise.
    speed: f32,
}

impl Spin {
    /// One full turn every four seconds.
    pub const DEFAULT_SPEED: f32 = TAU / 4.0;

    pub fn new(speed: f32) -> Self {
        Self { angle: 0.0, speed }
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Advances by `dt` seconds and returns the new angle, kept within one turn.
    pub fn advance(&mut self, dt: f32) -> f32 {
        self.angle = normalize_angle(self.angle + self.speed * dt);
        self.angle
    }
}

impl Default for Spin {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SPEED)
    }
}
