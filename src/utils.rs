use crate::body::Body;
use crate::error::{ConfigError, Result};

/// Pixel grid of probe bodies covering a rectangle of the simulation domain.
///
/// One probe per `pixel_size` x `pixel_size` cell, placed at the cell centre. Probes are
/// generated column by column (x outer, y inner), which is also the order collision
/// records index them in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProbeGrid {
    pub width: usize,
    pub height: usize,
    pub pixel_size: usize,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
}

impl ProbeGrid {
    /// Grid centred on (0.5, 0.5) spanning one unit vertically, stretched horizontally to
    /// keep pixels square.
    pub fn centered(width: usize, height: usize, pixel_size: usize) -> Self {
        let y_half = 0.5;
        let x_half = if height == 0 {
            y_half
        } else {
            y_half * width as f64 / height as f64
        };
        Self {
            width,
            height,
            pixel_size,
            x_range: (0.5 - x_half, 0.5 + x_half),
            y_range: (0.5 - y_half, 0.5 + y_half),
        }
    }

    pub fn columns(&self) -> usize {
        self.width / self.pixel_size.max(1)
    }

    pub fn rows(&self) -> usize {
        self.height / self.pixel_size.max(1)
    }

    /// Pixel coordinates (top-left corner) of probe `index`.
    pub fn pixel_of(&self, index: usize) -> (usize, usize) {
        let rows = self.rows().max(1);
        ((index / rows) * self.pixel_size, (index % rows) * self.pixel_size)
    }

    /// Generates the probes. The pixel size must tile the image exactly.
    pub fn probes(&self) -> Result<Vec<Body>> {
        if self.pixel_size == 0 || self.width % self.pixel_size != 0 || self.height % self.pixel_size != 0 {
            return Err(ConfigError::InvalidGrid(format!(
                "pixel size {} does not tile {}x{}",
                self.pixel_size, self.width, self.height
            ))
            .into());
        }

        let mut bodies = Vec::with_capacity(self.columns() * self.rows());
        for column in 0..self.columns() {
            for row in 0..self.rows() {
                let x_ratio = (column as f64 + 0.5) * self.pixel_size as f64 / self.width as f64;
                let y_ratio = (row as f64 + 0.5) * self.pixel_size as f64 / self.height as f64;
                let x = self.x_range.0 + x_ratio * (self.x_range.1 - self.x_range.0);
                let y = self.y_range.0 + y_ratio * (self.y_range.1 - self.y_range.0);
                bodies.push(Body::probe(x, y));
            }
        }
        Ok(bodies)
    }
}

/// Gravitational constant under which [`binary_stars`] are in near-circular orbit.
pub const BINARY_STAR_G: f64 = 0.002;

/// Two equal stars in mutual orbit, the attractors of the binary-star basin map.
pub fn binary_stars() -> [Body; 2] {
    [
        Body::from_components(0.3, 0.5, 0.0, -0.1, 5.0),
        Body::from_components(0.7, 0.5, 0.0, 0.1, 5.0),
    ]
}

/// Ring of `count` Klein-Gordon oscillators at rest, with the centre one kicked.
pub fn klein_gordon_chain(count: usize, center_momentum: f64) -> Vec<Body> {
    let center = count.saturating_sub(1) / 2;
    (0..count)
        .map(|i| {
            let vy = if i == center { center_momentum } else { 0.0 };
            Body::from_components(i as f64 + 0.5, 0.0, 0.0, vy, 0.0)
        })
        .collect()
}

/// `n` bodies with random positions and velocities in the unit square and masses in
/// `[0.5, 4)`. The same seed always yields the same bodies.
pub fn random_bodies(n: usize, seed: u64) -> Vec<Body> {
    let mut rng = fastrand::Rng::with_seed(seed);
    (0..n)
        .map(|_| {
            let x = rng.f64();
            let y = rng.f64();
            let vx = rng.f64();
            let vy = rng.f64();
            let mass = (1.0 + rng.f64()).powi(3) / 2.0;
            Body::from_components(x, y, vx, vy, mass)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_grid_covers_pixel_centres() {
        let grid = ProbeGrid {
            width: 4,
            height: 2,
            pixel_size: 2,
            x_range: (0.0, 1.0),
            y_range: (0.0, 1.0),
        };
        let probes = grid.probes().unwrap();
        assert_eq!(probes.len(), 2);
        assert_eq!((probes[0].pos.x, probes[0].pos.y), (0.25, 0.5));
        assert_eq!((probes[1].pos.x, probes[1].pos.y), (0.75, 0.5));
        assert!(probes.iter().all(|b| b.mass == 0.0));
        assert_eq!(grid.pixel_of(1), (2, 0));
    }

    #[test]
    fn probe_grid_rejects_ragged_pixels() {
        assert!(ProbeGrid::centered(240, 180, 7).probes().is_err());
        assert_eq!(ProbeGrid::centered(240, 180, 2).probes().unwrap().len(), 120 * 90);
    }

    #[test]
    fn chain_kicks_the_centre() {
        let chain = klein_gordon_chain(101, 0.875);
        assert_eq!(chain.len(), 101);
        assert_eq!(chain[50].vel.y, 0.875);
        assert_eq!(chain.iter().filter(|b| b.vel.y != 0.0).count(), 1);
    }

    #[test]
    fn random_bodies_are_reproducible() {
        let a = random_bodies(16, 7);
        assert_eq!(a, random_bodies(16, 7));
        assert!(a.iter().all(|b| (0.5..4.0).contains(&b.mass)));
    }
}
