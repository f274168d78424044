//! Derived quantities for the oscillator chain.
//!
//! The chain moves along `y`; `x` only orders the oscillators for display.

use crate::body::Body;
use crate::error::{ConfigError, Result};

fn oscillator_energy(body: &Body, left: &Body, right: &Body, epsilon: f64) -> f64 {
    let y = body.pos.y;
    let half_y2 = 0.5 * y * y;
    let d_left = y - left.pos.y;
    let d_right = y - right.pos.y;
    half_y2 + half_y2 * half_y2 // y^2/2 + y^4/4
        + 0.5 * body.vel.y * body.vel.y
        + 0.25 * epsilon * (d_left * d_left + d_right * d_right)
}

/// Energy of every oscillator on the ring, neighbours wrapping around at the ends.
pub fn chain_energies(bodies: &[Body], epsilon: f64) -> Vec<f64> {
    let n = bodies.len();
    (0..n)
        .map(|i| {
            let left = &bodies[(i + n - 1) % n];
            let right = &bodies[(i + 1) % n];
            oscillator_energy(&bodies[i], left, right, epsilon)
        })
        .collect()
}

/// Total ring energy; conserved up to integration error.
pub fn chain_total_energy(bodies: &[Body], epsilon: f64) -> f64 {
    chain_energies(bodies, epsilon).iter().sum()
}

/// Flattens the chain into `[y_0 .. y_n-1, vy_0 .. vy_n-1]`.
pub fn phase_state(bodies: &[Body]) -> Vec<f64> {
    let mut state = Vec::with_capacity(2 * bodies.len());
    state.extend(bodies.iter().map(|b| b.pos.y));
    state.extend(bodies.iter().map(|b| b.vel.y));
    state
}

/// Loads a vector produced by [`phase_state`] back into the bodies.
pub fn load_phase_state(bodies: &mut [Body], state: &[f64]) -> Result<()> {
    let n = bodies.len();
    if state.len() != 2 * n {
        return Err(ConfigError::StateLength {
            expected: 2 * n,
            found: state.len(),
        }
        .into());
    }
    if state.iter().any(|v| !v.is_finite()) {
        return Err(ConfigError::NonFiniteBody.into());
    }
    let (ys, vys) = state.split_at(n);
    for ((body, &y), &vy) in bodies.iter_mut().zip(ys).zip(vys) {
        body.pos.y = y;
        body.vel.y = vy;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ring(n: usize) -> Vec<Body> {
        (0..n).map(|i| Body::probe(i as f64 + 0.5, 0.0)).collect()
    }

    #[test]
    fn kinetic_only_energy_for_a_kicked_oscillator() {
        let mut bodies = ring(5);
        bodies[2].vel.y = 0.875;
        let energies = chain_energies(&bodies, 0.1);
        assert_relative_eq!(energies[2], 0.5 * 0.875 * 0.875, epsilon = 1e-15);
        assert!(energies.iter().enumerate().all(|(i, e)| i == 2 || *e == 0.0));
    }

    #[test]
    fn displaced_oscillator_shares_coupling_energy() {
        let mut bodies = ring(4);
        bodies[0].pos.y = 1.0;
        let energies = chain_energies(&bodies, 0.1);
        // 1/2 + 1/4 + 0.025 * (1 + 1)
        assert_relative_eq!(energies[0], 0.8, epsilon = 1e-15);
        assert_relative_eq!(energies[1], 0.025, epsilon = 1e-15);
        assert_relative_eq!(energies[3], 0.025, epsilon = 1e-15);
        assert_relative_eq!(chain_total_energy(&bodies, 0.1), 0.85, epsilon = 1e-15);
    }

    #[test]
    fn phase_state_layout_and_reload() {
        let mut bodies = ring(3);
        bodies[1].pos.y = 0.25;
        bodies[2].vel.y = -0.5;
        let state = phase_state(&bodies);
        assert_eq!(state, vec![0.0, 0.25, 0.0, 0.0, 0.0, -0.5]);

        let mut fresh = ring(3);
        load_phase_state(&mut fresh, &state).unwrap();
        assert_eq!(phase_state(&fresh), state);
    }

    #[test]
    fn reload_rejects_wrong_length() {
        let mut bodies = ring(3);
        let err = load_phase_state(&mut bodies, &[0.0; 5]).unwrap_err();
        assert!(err.to_string().contains("expected 6"));
    }
}
