use ultraviolet::DVec2;

use crate::error::{ConfigError, Result};

/// Coordinate a body is parked at once it has collided.
///
/// Far outside the unit domain every scenario lives in, so a frozen body can never overlap
/// live geometry again.
pub const DEAD_SENTINEL: f64 = 999.0;

/// A point body (or oscillator) in the simulation.
///
/// Bodies with zero mass are test bodies: they feel massive bodies but never pull back.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Body {
    /// Position vector.
    pub pos: DVec2,
    /// Velocity vector.
    pub vel: DVec2,
    /// Mass of the body. Zero marks a small body.
    pub mass: f64,
    /// Cleared on the first collision; a dead body is frozen.
    pub alive: bool,
}

impl Default for Body {
    fn default() -> Self {
        Self::new(DVec2::zero(), DVec2::zero(), 0.0)
    }
}

impl Body {
    /// Creates a new live Body with the given properties.
    pub fn new(pos: DVec2, vel: DVec2, mass: f64) -> Self {
        Self {
            pos,
            vel,
            mass,
            alive: true,
        }
    }

    /// Convenience constructor from scalar components.
    pub fn from_components(x: f64, y: f64, vx: f64, vy: f64, mass: f64) -> Self {
        Self::new(DVec2::new(x, y), DVec2::new(vx, vy), mass)
    }

    /// Creates a zero-mass test body at rest.
    pub fn probe(x: f64, y: f64) -> Self {
        Self::from_components(x, y, 0.0, 0.0, 0.0)
    }

    pub fn is_massive(&self) -> bool {
        self.mass > 0.0
    }

    /// Checks the body can enter a simulation: finite state and a non-negative mass.
    pub fn validate(&self) -> Result<()> {
        if !self.mass.is_finite() || self.mass < 0.0 {
            return Err(ConfigError::InvalidMass(self.mass).into());
        }
        let finite = [self.pos.x, self.pos.y, self.vel.x, self.vel.y]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(ConfigError::NonFiniteBody.into());
        }
        Ok(())
    }

    /// Marks the body dead and parks it at the sentinel with no velocity.
    pub fn kill(&mut self) {
        self.alive = false;
        self.pos = DVec2::broadcast(DEAD_SENTINEL);
        self.vel = DVec2::zero();
    }

    /// Position drift used by the integrator. Dead bodies stay where they are.
    pub fn drift(&mut self, h: f64) {
        if self.alive {
            self.pos += self.vel * h;
        }
    }

    /// Velocity kick from an already computed acceleration.
    pub fn kick(&mut self, acc: DVec2, h: f64) {
        if self.alive {
            self.vel += acc * h;
        }
    }
}
