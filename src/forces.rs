//! Force laws: compute the acceleration of every live body in an [`Ensemble`].
//!
//! A force law is selected once per simulation and matched exhaustively here. The output
//! buffer is reset on every call, so nothing accumulates between steps.

use serde::{Deserialize, Serialize};
use ultraviolet::DVec2;

use crate::body::Body;
use crate::ensemble::Ensemble;
use crate::error::{Result, SimError};

/// Newtonian gravity between massive bodies, felt (but never exerted) by small bodies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GravityParams {
    /// Gravitational constant in normalised units.
    pub gravitational_constant: f64,
}

impl Default for GravityParams {
    fn default() -> Self {
        Self {
            gravitational_constant: 1.0,
        }
    }
}

/// Radial spring from every body to a fixed anchor, plus a uniform background pull.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpringParams {
    pub anchor: [f64; 2],
    pub stiffness: f64,
    /// Natural length of the spring; no restoring force at this distance.
    pub rest_length: f64,
    pub inverse_mass: f64,
    /// Constant acceleration added to every live body.
    pub background: [f64; 2],
}

impl Default for SpringParams {
    fn default() -> Self {
        Self {
            anchor: [0.5, 0.5],
            stiffness: 0.1,
            rest_length: 0.0725,
            inverse_mass: 1.0,
            background: [0.0, 0.005],
        }
    }
}

impl SpringParams {
    pub fn anchor(&self) -> DVec2 {
        DVec2::new(self.anchor[0], self.anchor[1])
    }
}

/// Ring of nonlinear (Klein-Gordon) oscillators with nearest-neighbour coupling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainParams {
    /// Coupling constant between ring neighbours.
    pub epsilon: f64,
}

impl Default for ChainParams {
    fn default() -> Self {
        Self { epsilon: 0.1 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ForceLaw {
    Gravity(GravityParams),
    Spring(SpringParams),
    Chain(ChainParams),
}

impl Default for ForceLaw {
    fn default() -> Self {
        ForceLaw::Gravity(GravityParams::default())
    }
}

impl ForceLaw {
    pub fn name(&self) -> &'static str {
        match self {
            ForceLaw::Gravity(_) => "gravity",
            ForceLaw::Spring(_) => "spring",
            ForceLaw::Chain(_) => "chain",
        }
    }

    /// True when every body depends on its neighbours, so the ensemble cannot be split.
    pub fn is_coupled(&self) -> bool {
        matches!(self, ForceLaw::Chain(_))
    }

    /// Overwrites `out` (one entry per body in `ens`) with the current accelerations.
    pub fn accelerations(&self, ens: &Ensemble, out: &mut [DVec2]) -> Result<()> {
        debug_assert_eq!(out.len(), ens.len());
        out.iter_mut().for_each(|a| *a = DVec2::zero());

        match self {
            ForceLaw::Gravity(params) => gravity(params, ens, out),
            ForceLaw::Spring(params) => spring(params, ens.bodies(), out),
            ForceLaw::Chain(params) => {
                chain(params, ens.bodies(), out);
                Ok(())
            }
        }
    }
}

/// `G (r_j - r_i) / |r_j - r_i|^3`, failing on coincident bodies instead of producing NaN.
fn pair_factor(params: &GravityParams, bi: &Body, bj: &Body) -> Result<DVec2> {
    let d = bj.pos - bi.pos;
    let r2 = d.mag_sq();
    let coef = params.gravitational_constant / (r2 * r2.sqrt());
    if r2 == 0.0 || !coef.is_finite() {
        return Err(SimError::NumericDegeneracy {
            law: "gravity",
            x: bi.pos.x,
            y: bi.pos.y,
        });
    }
    Ok(d * coef)
}

fn gravity(params: &GravityParams, ens: &Ensemble, out: &mut [DVec2]) -> Result<()> {
    let bodies = ens.bodies();
    let massive = ens.massive_indices();

    for (a, &i) in massive.iter().enumerate() {
        let bi = &bodies[i];
        if !bi.alive {
            continue;
        }

        // Massive pairs, symmetric.
        for &j in &massive[a + 1..] {
            let bj = &bodies[j];
            if !bj.alive {
                continue;
            }
            let f = pair_factor(params, bi, bj)?;
            out[i] += f * bj.mass;
            out[j] -= f * bi.mass;
        }

        // Small bodies only receive.
        for &j in ens.small_indices() {
            let bj = &bodies[j];
            if !bj.alive {
                continue;
            }
            let f = pair_factor(params, bi, bj)?;
            out[j] -= f * bi.mass;
        }
    }
    Ok(())
}

fn spring(params: &SpringParams, bodies: &[Body], out: &mut [DVec2]) -> Result<()> {
    let anchor = params.anchor();
    let background = DVec2::new(params.background[0], params.background[1]);

    for (body, acc) in bodies.iter().zip(out.iter_mut()) {
        if !body.alive {
            continue;
        }
        let d = anchor - body.pos;
        let radius = d.mag();
        if radius == 0.0 {
            return Err(SimError::NumericDegeneracy {
                law: "spring",
                x: body.pos.x,
                y: body.pos.y,
            });
        }
        let deformation = radius - params.rest_length;
        *acc += d * (params.stiffness * deformation * params.inverse_mass / radius);
        *acc += background;
    }
    Ok(())
}

fn chain(params: &ChainParams, bodies: &[Body], out: &mut [DVec2]) {
    let n = bodies.len();
    for (i, body) in bodies.iter().enumerate() {
        if !body.alive {
            continue;
        }
        let y = body.pos.y;
        let left = bodies[(i + n - 1) % n].pos.y;
        let right = bodies[(i + 1) % n].pos.y;
        out[i] = DVec2::new(0.0, -y - y * y * y + params.epsilon * (left + right - 2.0 * y));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn accelerations(law: &ForceLaw, ens: &Ensemble) -> Vec<DVec2> {
        let mut out = vec![DVec2::new(9.0, 9.0); ens.len()];
        law.accelerations(ens, &mut out).unwrap();
        out
    }

    #[test]
    fn gravity_massive_pair_conserves_momentum() {
        let mut ens = Ensemble::new();
        ens.push(Body::from_components(-0.5, 0.0, 0.0, 0.0, 2.0));
        ens.push(Body::from_components(0.5, 0.3, 0.0, 0.0, 3.0));
        let acc = accelerations(&ForceLaw::default(), &ens);
        let net = acc[0] * 2.0 + acc[1] * 3.0;
        assert!(net.mag() < 1e-12, "net momentum change {net:?}");
        assert!(acc[0].x > 0.0, "first body should be pulled toward the second");
    }

    #[test]
    fn gravity_inverse_square() {
        let mut near = Ensemble::new();
        near.push(Body::from_components(0.0, 0.0, 0.0, 0.0, 1.0));
        near.push(Body::probe(1.0, 0.0));
        let mut far = Ensemble::new();
        far.push(Body::from_components(0.0, 0.0, 0.0, 0.0, 1.0));
        far.push(Body::probe(2.0, 0.0));

        let law = ForceLaw::default();
        let ratio = accelerations(&law, &near)[1].mag() / accelerations(&law, &far)[1].mag();
        assert_relative_eq!(ratio, 4.0, epsilon = 1e-12);
    }

    #[test]
    fn small_bodies_never_pull_back() {
        let mut ens = Ensemble::new();
        ens.push(Body::from_components(0.0, 0.0, 0.0, 0.0, 1.0));
        ens.push(Body::probe(0.1, 0.0));
        let acc = accelerations(&ForceLaw::default(), &ens);
        assert_eq!(acc[0], DVec2::zero());
        assert_relative_eq!(acc[1].x, -100.0, epsilon = 1e-9);
    }

    #[test]
    fn dead_bodies_are_skipped() {
        let mut ens = Ensemble::new();
        ens.push(Body::from_components(0.0, 0.0, 0.0, 0.0, 1.0));
        ens.push(Body::probe(0.1, 0.0));
        ens.small_body_mut(0).unwrap().kill();
        let acc = accelerations(&ForceLaw::default(), &ens);
        assert_eq!(acc[1], DVec2::zero());
    }

    #[test]
    fn coincident_bodies_are_degenerate() {
        let mut ens = Ensemble::new();
        ens.push(Body::from_components(0.2, 0.2, 0.0, 0.0, 1.0));
        ens.push(Body::probe(0.2, 0.2));
        let mut out = vec![DVec2::zero(); 2];
        let err = ForceLaw::default().accelerations(&ens, &mut out).unwrap_err();
        assert!(matches!(err, SimError::NumericDegeneracy { law: "gravity", .. }));
    }

    #[test]
    fn spring_at_rest_length_only_feels_background() {
        let params = SpringParams {
            anchor: [0.0, 0.0],
            background: [0.0, 0.0],
            ..SpringParams::default()
        };
        let mut ens = Ensemble::new();
        ens.push(Body::probe(params.rest_length, 0.0));
        let acc = accelerations(&ForceLaw::Spring(params), &ens);
        assert_eq!(acc[0], DVec2::zero());
    }

    #[test]
    fn spring_pulls_stretched_body_toward_anchor() {
        let params = SpringParams::default();
        let mut ens = Ensemble::new();
        ens.push(Body::probe(0.5 + 0.2, 0.5));
        let acc = accelerations(&ForceLaw::Spring(params.clone()), &ens);
        let expected = -params.stiffness * (0.2 - params.rest_length);
        assert_relative_eq!(acc[0].x, expected, epsilon = 1e-12);
        assert_relative_eq!(acc[0].y, params.background[1], epsilon = 1e-15);
    }

    #[test]
    fn spring_body_on_anchor_is_degenerate() {
        let mut ens = Ensemble::new();
        ens.push(Body::probe(0.5, 0.5));
        let mut out = vec![DVec2::zero(); 1];
        let law = ForceLaw::Spring(SpringParams::default());
        assert!(law.accelerations(&ens, &mut out).is_err());
    }

    #[test]
    fn chain_couples_ring_neighbours_with_wraparound() {
        let mut ens = Ensemble::new();
        for i in 0..5 {
            ens.push(Body::probe(i as f64 + 0.5, 0.0));
        }
        ens.bodies_mut()[0].pos.y = 0.5;
        let acc = accelerations(&ForceLaw::Chain(ChainParams::default()), &ens);

        assert_relative_eq!(acc[0].y, -0.5 - 0.125 + 0.1 * (-1.0), epsilon = 1e-15);
        assert_relative_eq!(acc[1].y, 0.1 * 0.5, epsilon = 1e-15);
        assert_relative_eq!(acc[4].y, 0.1 * 0.5, epsilon = 1e-15);
        assert_eq!(acc[2].y, 0.0);
        assert!(acc.iter().all(|a| a.x == 0.0));
    }
}
