//! Proximity test between small bodies and collision targets.

use serde::{Deserialize, Serialize};
use ultraviolet::DVec2;

use crate::ensemble::Ensemble;
use crate::error::{ConfigError, Result};

/// Default collision radius; its square is roughly 0.0005.
pub const DEFAULT_COLLISION_RADIUS: f64 = 0.02236;

/// First contact of a small body with one or more targets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollisionRecord {
    /// Index into the small-body list.
    pub body_index: usize,
    /// Every target within the radius at detection time, ascending.
    pub collided_target_indexes: Vec<usize>,
    /// Simulation time (not step count) of the check that fired.
    pub collision_time: f64,
}

impl CollisionRecord {
    /// The target downstream consumers usually care about.
    pub fn first_target(&self) -> Option<usize> {
        self.collided_target_indexes.first().copied()
    }
}

/// What small bodies can collide with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Targets {
    /// The massive bodies, indexed by their position in the massive list.
    Massive,
    /// Fixed points that are not simulated.
    Points { points: Vec<[f64; 2]> },
    None,
}

impl Targets {
    pub fn point(x: f64, y: f64) -> Self {
        Targets::Points {
            points: vec![[x, y]],
        }
    }
}

#[derive(Clone, Debug)]
pub struct CollisionDetector {
    radius_sq: f64,
    targets: Targets,
}

impl CollisionDetector {
    pub fn new(radius: f64, targets: Targets) -> Result<Self> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(ConfigError::InvalidRadius(radius).into());
        }
        Ok(Self {
            radius_sq: radius * radius,
            targets,
        })
    }

    pub fn targets(&self) -> &Targets {
        &self.targets
    }

    fn target_positions(&self, ens: &Ensemble) -> Vec<(usize, DVec2)> {
        match &self.targets {
            Targets::Massive => ens
                .massive()
                .enumerate()
                .filter(|(_, body)| body.alive)
                .map(|(index, body)| (index, body.pos))
                .collect(),
            Targets::Points { points } => points
                .iter()
                .enumerate()
                .map(|(index, p)| (index, DVec2::new(p[0], p[1])))
                .collect(),
            Targets::None => Vec::new(),
        }
    }

    /// Checks every live small body against the targets. A hit appends one record, kills
    /// the body and parks it at the sentinel. Dead bodies are skipped, so calling this again
    /// never produces a second record for the same body.
    pub fn detect(&self, ens: &mut Ensemble, time: f64, records: &mut Vec<CollisionRecord>) {
        let targets = self.target_positions(ens);
        if targets.is_empty() {
            return;
        }

        for k in 0..ens.small_len() {
            let Some(body) = ens.small_body_mut(k) else {
                continue;
            };
            if !body.alive {
                continue;
            }
            let hits: Vec<usize> = targets
                .iter()
                .filter(|(_, target)| (body.pos - *target).mag_sq() < self.radius_sq)
                .map(|(index, _)| *index)
                .collect();
            if hits.is_empty() {
                continue;
            }
            body.kill();
            records.push(CollisionRecord {
                body_index: k,
                collided_target_indexes: hits,
                collision_time: time,
            });
        }
    }
}
