//! # Double-R iteration
//!
//! Escobal's method as formulated by Vallado (Algorithm 52). The geocentric
//! distances `r1`, `r2` of the first two observations are the unknowns; `r3` follows
//! from the orbit plane through `r1` and `r2`. The conic through the three positions
//! gives the mean-anomaly differences, and the residuals
//!
//! ```text
//! F1 = τ1 − ΔM12/n,   F2 = τ3 − ΔM32/n
//! ```
//!
//! are driven to zero with a finite-difference Newton iteration.

use log::debug;
use nalgebra::{Matrix2, Vector2, Vector3};

use crate::initial_orbit_determination::{
    initial_range_guess, state_from_canonical, CanonicalTriplet, IODParams, IodSolver,
};
use crate::observations::Observation;
use crate::orbit_type::StateVector;
use crate::tlefit_errors::{IodFailureKind, TleFitError};

const FD_STEP: f64 = 1e-7;

/// Everything derived from one trial `(r1, r2)`.
struct Trial {
    positions: [Vector3<f64>; 3],
    residual: Vector2<f64>,
    semi_major_axis: f64,
    delta_e32: f64,
}

/// Slant range reaching geocentric distance `r` along `los` from `observer`.
fn range_from_radius(observer: &Vector3<f64>, los: &Vector3<f64>, r: f64) -> Option<f64> {
    let c = 2.0 * los.dot(observer);
    let disc = c * c - 4.0 * (observer.norm_squared() - r * r);
    if disc < 0.0 {
        return None;
    }
    let rho = 0.5 * (-c + disc.sqrt());
    (rho > 0.0).then_some(rho)
}

fn evaluate(triplet: &CanonicalTriplet, radii: &Vector2<f64>) -> Result<Trial, TleFitError> {
    let observer = |i: usize| triplet.observer.column(i).into_owned();
    let los = |i: usize| triplet.los.column(i).into_owned();

    let rho1 = range_from_radius(&observer(0), &los(0), radii.x)
        .ok_or(IodFailureKind::SpuriousRootDetected)?;
    let rho2 = range_from_radius(&observer(1), &los(1), radii.y)
        .ok_or(IodFailureKind::SpuriousRootDetected)?;
    let r1 = triplet.position(0, rho1);
    let r2 = triplet.position(1, rho2);

    let w = r1.cross(&r2);
    if w.norm() <= f64::EPSILON {
        return Err(IodFailureKind::DegenerateTransferAngle.into());
    }
    let w = w.normalize();
    let l3w = los(2).dot(&w);
    if l3w.abs() <= f64::EPSILON {
        return Err(IodFailureKind::IllConditioned("third line of sight lies in the orbit plane").into());
    }
    let rho3 = -observer(2).dot(&w) / l3w;
    if rho3 <= 0.0 {
        return Err(IodFailureKind::SpuriousRootDetected.into());
    }
    let r3 = triplet.position(2, rho3);

    let (n1, n2, n3) = (r1.norm(), r2.norm(), r3.norm());
    let signed_angle =
        |a: &Vector3<f64>, b: &Vector3<f64>| a.cross(b).dot(&w).atan2(a.dot(b));
    let dnu21 = signed_angle(&r1, &r2);
    let dnu31 = signed_angle(&r1, &r3);
    let dnu32 = signed_angle(&r2, &r3);

    // a negative signed angle means the r1 → r3 arc exceeds 180°
    let p = if dnu31 < 0.0 {
        let c1 = n2 * dnu32.sin() / (n1 * dnu31.sin());
        let c3 = n1 * dnu21.sin() / (n3 * dnu31.sin());
        (c1 * n1 + c3 * n3 - n2) / (c1 + c3 - 1.0)
    } else {
        let c1 = n1 * dnu31.sin() / (n2 * dnu32.sin());
        let c3 = n1 * dnu21.sin() / (n3 * dnu32.sin());
        (c3 * n3 - c1 * n2 + n1) / (-c1 + c3 + 1.0)
    };
    if !(p.is_finite() && p > 0.0) {
        return Err(IodFailureKind::IllConditioned("non-positive semi-latus rectum").into());
    }

    let ecos1 = p / n1 - 1.0;
    let ecos2 = p / n2 - 1.0;
    let ecos3 = p / n3 - 1.0;
    let esin2 = if dnu21.sin().abs() > 1e-12 {
        (-dnu21.cos() * ecos2 + ecos1) / dnu21.sin()
    } else {
        (dnu32.cos() * ecos2 - ecos3) / dnu31.sin()
    };

    let e2 = ecos2 * ecos2 + esin2 * esin2;
    if e2 >= 1.0 {
        return Err(IodFailureKind::UnboundOrbit {
            eccentricity: e2.sqrt(),
        }
        .into());
    }
    let a = p / (1.0 - e2);
    let n = a.powf(-1.5);

    let s = n2 / p * (1.0 - e2).sqrt() * esin2;
    let c = n2 / p * (e2 + ecos2);
    let sqrt_ap = (a * p).sqrt();

    let sin_de32 = n3 / sqrt_ap * dnu32.sin() - n3 / p * (1.0 - dnu32.cos()) * s;
    let cos_de32 = 1.0 - n2 * n3 / (a * p) * (1.0 - dnu32.cos());
    let de32 = sin_de32.atan2(cos_de32);

    let sin_de21 = n1 / sqrt_ap * dnu21.sin() + n1 / p * (1.0 - dnu21.cos()) * s;
    let cos_de21 = 1.0 - n2 * n1 / (a * p) * (1.0 - dnu21.cos());
    let de21 = sin_de21.atan2(cos_de21);

    let dm32 = de32 + 2.0 * s * (0.5 * de32).sin().powi(2) - c * de32.sin();
    let dm12 = -de21 + 2.0 * s * (0.5 * de21).sin().powi(2) + c * de21.sin();

    Ok(Trial {
        positions: [r1, r2, r3],
        residual: Vector2::new(
            triplet.time[0] - dm12 / n,
            triplet.time[2] - dm32 / n,
        ),
        semi_major_axis: a,
        delta_e32: de32,
    })
}

/// Middle velocity from the converged trial with the f and g series in ΔE.
fn middle_velocity(triplet: &CanonicalTriplet, trial: &Trial) -> Vector3<f64> {
    let [_, r2, r3] = trial.positions;
    let a = trial.semi_major_axis;
    let de = trial.delta_e32;
    let f = 1.0 - a / r2.norm() * (1.0 - de.cos());
    let g = triplet.time[2] - a.powf(1.5) * (de - de.sin());
    (r3 - f * r2) / g
}

/// Double-R iteration on the first three observations.
#[derive(Debug, Clone, Copy, Default)]
pub struct DoubleRSolver;

impl IodSolver for DoubleRSolver {
    fn name(&self) -> &'static str {
        "double-r"
    }

    fn solve_state(
        &self,
        observations: &[Observation],
        params: &IODParams,
    ) -> Result<StateVector, TleFitError> {
        let triplet = CanonicalTriplet::from_observations(observations)?;
        let mut radii = Vector2::new(
            triplet
                .position(0, initial_range_guess(&triplet, observations, params, 0))
                .norm(),
            triplet
                .position(1, initial_range_guess(&triplet, observations, params, 1))
                .norm(),
        );

        for iteration in 0..params.range_max_iter {
            let trial = evaluate(&triplet, &radii)?;

            let mut jacobian = Matrix2::zeros();
            for k in 0..2 {
                let h = FD_STEP * radii[k];
                let mut shifted = radii;
                shifted[k] += h;
                let column = (evaluate(&triplet, &shifted)?.residual - trial.residual) / h;
                jacobian.set_column(k, &column);
            }

            let step = jacobian
                .lu()
                .solve(&(-trial.residual))
                .ok_or(IodFailureKind::IllConditioned("Double-R Jacobian is singular"))?;
            radii += step;

            if step.norm() <= params.range_tolerance * radii.norm() {
                debug!(
                    "double-r converged after {} iterations, r = ({:.6}, {:.6}) DU",
                    iteration + 1,
                    radii.x,
                    radii.y
                );
                let trial = evaluate(&triplet, &radii)?;
                let velocity = middle_velocity(&triplet, &trial);
                return Ok(state_from_canonical(
                    triplet.reference_epoch,
                    &trial.positions[1],
                    &velocity,
                ));
            }
        }

        Err(IodFailureKind::NoConvergence {
            method: "double-r",
            iterations: params.range_max_iter,
        }
        .into())
    }
}
