//! Fixed-step symplectic integrators built from drift and kick sub-steps.
//!
//! One outer step is a symmetric composition of drifts (`pos += vel * h`) and kicks
//! (recompute accelerations, then `vel += acc * h`). Collision checks run once per outer
//! step, after the composition completes.

use serde::{Deserialize, Serialize};
use ultraviolet::DVec2;

use crate::collisions::{CollisionDetector, CollisionRecord};
use crate::ensemble::Ensemble;
use crate::error::{ConfigError, Result};
use crate::forces::ForceLaw;

// Yoshida 4th-order weights: w1 = 1 / (2 - 2^(1/3)), w0 = -2^(1/3) / (2 - 2^(1/3)).
const YOSHIDA_W1: f64 = 1.351_207_191_959_657_8;
const YOSHIDA_W0: f64 = -1.702_414_383_919_315_3;

#[derive(Clone, Copy, Debug, PartialEq)]
enum SubStep {
    Drift(f64),
    Kick(f64),
}

const FIRST_ORDER: [SubStep; 2] = [SubStep::Drift(1.0), SubStep::Kick(1.0)];

const SECOND_ORDER: [SubStep; 3] = [SubStep::Drift(0.5), SubStep::Kick(1.0), SubStep::Drift(0.5)];

const FOURTH_ORDER: [SubStep; 7] = [
    SubStep::Drift(YOSHIDA_W1 / 2.0),
    SubStep::Kick(YOSHIDA_W1),
    SubStep::Drift((YOSHIDA_W0 + YOSHIDA_W1) / 2.0),
    SubStep::Kick(YOSHIDA_W0),
    SubStep::Drift((YOSHIDA_W0 + YOSHIDA_W1) / 2.0),
    SubStep::Kick(YOSHIDA_W1),
    SubStep::Drift(YOSHIDA_W1 / 2.0),
];

/// Symmetry order of the drift/kick composition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum IntegrationOrder {
    /// Symplectic Euler: drift, kick.
    First,
    /// Leapfrog: half drift, kick, half drift.
    #[default]
    Second,
    /// Yoshida composition of three leapfrogs.
    Fourth,
}

impl TryFrom<u8> for IntegrationOrder {
    type Error = ConfigError;

    fn try_from(order: u8) -> std::result::Result<Self, Self::Error> {
        match order {
            1 => Ok(IntegrationOrder::First),
            2 => Ok(IntegrationOrder::Second),
            4 => Ok(IntegrationOrder::Fourth),
            other => Err(ConfigError::UnsupportedOrder(other)),
        }
    }
}

impl From<IntegrationOrder> for u8 {
    fn from(order: IntegrationOrder) -> u8 {
        match order {
            IntegrationOrder::First => 1,
            IntegrationOrder::Second => 2,
            IntegrationOrder::Fourth => 4,
        }
    }
}

impl IntegrationOrder {
    fn schedule(self) -> &'static [SubStep] {
        match self {
            IntegrationOrder::First => &FIRST_ORDER,
            IntegrationOrder::Second => &SECOND_ORDER,
            IntegrationOrder::Fourth => &FOURTH_ORDER,
        }
    }
}

/// Advances an ensemble with a fixed step `dt`.
///
/// Owns the acceleration scratch buffer, so no acceleration state survives on the bodies
/// between calls.
#[derive(Clone, Debug)]
pub struct Integrator {
    dt: f64,
    order: IntegrationOrder,
    acc: Vec<DVec2>,
}

impl Integrator {
    pub fn new(dt: f64, order: IntegrationOrder) -> Result<Self> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(ConfigError::NonPositiveDt(dt).into());
        }
        Ok(Self {
            dt,
            order,
            acc: Vec::new(),
        })
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn order(&self) -> IntegrationOrder {
        self.order
    }

    /// Performs one outer step of the configured composition.
    pub fn step(&mut self, ens: &mut Ensemble, law: &ForceLaw) -> Result<()> {
        self.acc.resize(ens.len(), DVec2::zero());
        for &sub in self.order.schedule() {
            match sub {
                SubStep::Drift(c) => drift(ens, c * self.dt),
                SubStep::Kick(c) => self.kick(ens, law, c * self.dt)?,
            }
        }
        Ok(())
    }

    /// Runs `steps` outer steps starting at global step `first_step`, checking collisions
    /// after each one. Records are stamped with the time at the start of their step.
    ///
    /// Bodies already overlapping a target are collided before the first force evaluation,
    /// so a body sitting on a target is never pulled through it.
    pub fn run(
        &mut self,
        ens: &mut Ensemble,
        law: &ForceLaw,
        detector: &CollisionDetector,
        first_step: u64,
        steps: u64,
    ) -> Result<Vec<CollisionRecord>> {
        let mut records = Vec::new();
        if steps == 0 {
            return Ok(records);
        }
        detector.detect(ens, first_step as f64 * self.dt, &mut records);
        for k in 0..steps {
            self.step(ens, law)?;
            let time = (first_step + k) as f64 * self.dt;
            detector.detect(ens, time, &mut records);
        }
        Ok(records)
    }

    fn kick(&mut self, ens: &mut Ensemble, law: &ForceLaw, h: f64) -> Result<()> {
        law.accelerations(ens, &mut self.acc)?;
        for (body, &acc) in ens.bodies_mut().iter_mut().zip(self.acc.iter()) {
            body.kick(acc, h);
        }
        Ok(())
    }
}

fn drift(ens: &mut Ensemble, h: f64) {
    for body in ens.bodies_mut() {
        body.drift(h);
    }
}
