//! # Gooding's method
//!
//! The slant ranges `ρ1`, `ρ3` of the outer observations are the unknowns. For a
//! trial pair, Lambert's problem from `r1` to `r3` gives the transfer orbit, which is
//! propagated to the middle epoch. The miss between the predicted position and the
//! middle line of sight is projected on two axes perpendicular to it; Newton's method
//! with a finite-difference Jacobian drives both components to zero.

use log::debug;
use nalgebra::{Matrix2, Vector2, Vector3};

use crate::initial_orbit_determination::lambert::lambert;
use crate::initial_orbit_determination::{
    initial_range_guess, state_from_canonical, CanonicalTriplet, IODParams, IodSolver,
};
use crate::kepler::propagate;
use crate::observations::Observation;
use crate::orbit_type::StateVector;
use crate::tlefit_errors::{IodFailureKind, TleFitError};

/// Relative step of the finite-difference Jacobian.
const FD_STEP: f64 = 1e-7;

/// Two unit vectors completing `los` into an orthonormal basis.
fn perpendicular_axes(los: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    let helper = if los.z.abs() < 0.9 {
        Vector3::z()
    } else {
        Vector3::x()
    };
    let p = los.cross(&helper).normalize();
    let q = los.cross(&p);
    (p, q)
}

struct Problem<'a> {
    triplet: &'a CanonicalTriplet,
    p: Vector3<f64>,
    q: Vector3<f64>,
}

impl Problem<'_> {
    /// Middle state on the Lambert arc through `ρ1`, `ρ3`.
    fn middle_state(&self, rho: &Vector2<f64>) -> Result<(Vector3<f64>, Vector3<f64>), TleFitError> {
        let t = &self.triplet.time;
        let r1 = self.triplet.position(0, rho.x);
        let r3 = self.triplet.position(2, rho.y);
        let (v1, _) = lambert(&r1, &r3, t[2] - t[0], 1.0)?;
        Ok(propagate(&r1, &v1, t[1] - t[0], 1.0)?)
    }

    fn miss(&self, rho: &Vector2<f64>) -> Result<Vector2<f64>, TleFitError> {
        let (r2, _) = self.middle_state(rho)?;
        let d = r2 - self.triplet.observer.column(1);
        Ok(Vector2::new(d.dot(&self.p), d.dot(&self.q)))
    }
}

/// Gooding's method on the first three observations.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoodingSolver;

impl IodSolver for GoodingSolver {
    fn name(&self) -> &'static str {
        "gooding"
    }

    fn solve_state(
        &self,
        observations: &[Observation],
        params: &IODParams,
    ) -> Result<StateVector, TleFitError> {
        let triplet = CanonicalTriplet::from_observations(observations)?;
        let (p, q) = perpendicular_axes(&triplet.los.column(1).into_owned());
        let problem = Problem {
            triplet: &triplet,
            p,
            q,
        };

        let mut rho = Vector2::new(
            initial_range_guess(&triplet, observations, params, 0),
            initial_range_guess(&triplet, observations, params, 2),
        );

        for iteration in 0..params.range_max_iter {
            let f = problem.miss(&rho)?;

            let mut jacobian = Matrix2::zeros();
            for k in 0..2 {
                let h = FD_STEP * rho[k].max(1e-3);
                let mut shifted = rho;
                shifted[k] += h;
                let column = (problem.miss(&shifted)? - f) / h;
                jacobian.set_column(k, &column);
            }

            let step = jacobian
                .lu()
                .solve(&(-f))
                .ok_or(IodFailureKind::IllConditioned("Gooding Jacobian is singular"))?;

            let mut next = rho + step;
            for k in 0..2 {
                // keep the ranges positive
                if next[k] <= 0.0 {
                    next[k] = 0.5 * rho[k];
                }
            }
            let moved = (next - rho).norm();
            rho = next;

            if moved <= params.range_tolerance * (1.0 + rho.norm()) {
                debug!(
                    "gooding converged after {} iterations, ρ = ({:.6}, {:.6}) DU",
                    iteration + 1,
                    rho.x,
                    rho.y
                );
                let (r2, v2) = problem.middle_state(&rho)?;
                return Ok(state_from_canonical(triplet.reference_epoch, &r2, &v2));
            }
        }

        Err(IodFailureKind::NoConvergence {
            method: "gooding",
            iterations: params.range_max_iter,
        }
        .into())
    }
}
