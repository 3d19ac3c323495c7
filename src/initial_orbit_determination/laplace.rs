//! # Laplace method
//!
//! The line of sight `L(t)` and the observer position `R(t)` are differentiated at the
//! middle epoch, either by Lagrange interpolation of three observations
//! ([`LaplaceSolver`]) or by a least-squares polynomial fit of N observations
//! ([`MultiLaplaceSolver`]).
//!
//! With `r = R + ρL` and `r̈ = −r/r³` (canonical units), the dot product with
//! `N = L × L̇` removes `ρ̇` and `ρ̈`:
//!
//! ```text
//! ρ = A + B/r³,   A = −(R̈·N)/D,   B = −(R·N)/D,   D = L̈·N
//! ```
//!
//! Combined with `r² = ρ² + 2ρ(L·R) + R²` this gives the same sparse degree-8
//! polynomial as Gauss, solved with the same root machinery. The range rate follows
//! from the dot product with `M = L × L̈`:
//! `ρ̇ = −(R·M/r³ + R̈·M) / (2 L̇·M)`.

use std::ops::ControlFlow;

use hifitime::Epoch;
use log::debug;
use nalgebra::{DMatrix, Vector3};

use crate::constants::{time_unit, DISTANCE_UNIT};
use crate::initial_orbit_determination::gauss::{descartes_upper_bound_deg8_sparse, GaussObs};
use crate::initial_orbit_determination::{state_from_canonical, IODParams, IodSolver};
use crate::kepler::eccentricity_vector;
use crate::observations::{check_batch, Observation};
use crate::orbit_type::StateVector;
use crate::time::seconds_between;
use crate::tlefit_errors::{IodFailureKind, TleFitError};

/// Line of sight and observer position with their first two time derivatives at
/// `epoch`, canonical units.
#[derive(Debug, Clone, PartialEq)]
struct Derivatives {
    epoch: Epoch,
    los: [Vector3<f64>; 3],
    observer: [Vector3<f64>; 3],
}

/// Weights `(w', w'')` such that `f'(x) = Σ w'_i f(t_i)` and `f''(x) = Σ w''_i f(t_i)`
/// for the quadratic through three samples.
fn lagrange_weights(t: [f64; 3], x: f64) -> ([f64; 3], [f64; 3]) {
    let mut first = [0.0; 3];
    let mut second = [0.0; 3];
    for i in 0..3 {
        let (j, k) = ((i + 1) % 3, (i + 2) % 3);
        let denom = (t[i] - t[j]) * (t[i] - t[k]);
        first[i] = ((x - t[j]) + (x - t[k])) / denom;
        second[i] = 2.0 / denom;
    }
    (first, second)
}

fn weighted_sum(w: &[f64; 3], v: &[Vector3<f64>; 3]) -> Vector3<f64> {
    w[0] * v[0] + w[1] * v[1] + w[2] * v[2]
}

fn three_point_derivatives(observations: &[Observation]) -> Derivatives {
    let epoch = observations[1].timestamp;
    let tu = time_unit();
    let t = [
        seconds_between(epoch, observations[0].timestamp) / tu,
        0.0,
        seconds_between(epoch, observations[2].timestamp) / tu,
    ];
    let (w1, w2) = lagrange_weights(t, 0.0);

    let los = [0, 1, 2].map(|i| observations[i].line_of_sight());
    let observer = [0, 1, 2].map(|i| observations[i].observer_position / DISTANCE_UNIT);

    Derivatives {
        epoch,
        los: [los[1], weighted_sum(&w1, &los), weighted_sum(&w2, &los)],
        observer: [
            observer[1],
            weighted_sum(&w1, &observer),
            weighted_sum(&w2, &observer),
        ],
    }
}

/// Least-squares polynomial of degree `degree` through every observation, evaluated
/// at the observation `observations.len() / 2`.
fn fitted_derivatives(
    observations: &[Observation],
    degree: usize,
) -> Result<Derivatives, TleFitError> {
    let n = observations.len();
    let epoch = observations[n / 2].timestamp;
    let tu = time_unit();
    let tau: Vec<f64> = observations
        .iter()
        .map(|o| seconds_between(epoch, o.timestamp) / tu)
        .collect();
    let scale = tau.iter().fold(0.0_f64, |m, t| m.max(t.abs()));

    let vandermonde = DMatrix::from_fn(n, degree + 1, |i, k| (tau[i] / scale).powi(k as i32));
    let svd = vandermonde.svd(true, true);

    let fit = |values: DMatrix<f64>| -> Result<[Vector3<f64>; 3], TleFitError> {
        let coeffs = svd
            .solve(&values, 1e-14)
            .map_err(|_| IodFailureKind::IllConditioned("polynomial fit of the track"))?;
        let row = |k: usize| Vector3::new(coeffs[(k, 0)], coeffs[(k, 1)], coeffs[(k, 2)]);
        Ok([row(0), row(1) / scale, 2.0 * row(2) / (scale * scale)])
    };

    let [los, los_dot, los_ddot] =
        fit(DMatrix::from_fn(n, 3, |i, j| observations[i].line_of_sight()[j]))?;
    let observer = fit(DMatrix::from_fn(n, 3, |i, j| {
        observations[i].observer_position[j] / DISTANCE_UNIT
    }))?;

    Ok(Derivatives {
        epoch,
        los: [los.normalize(), los_dot, los_ddot],
        observer,
    })
}

/// Solve the Laplace range equation, keeping the root of lowest eccentricity.
fn laplace_state(d: &Derivatives, params: &IODParams) -> Result<StateVector, TleFitError> {
    let [l, l_dot, l_ddot] = &d.los;
    let [obs, obs_dot, obs_ddot] = &d.observer;

    let n_vec = l.cross(l_dot);
    let det = l_ddot.dot(&n_vec);
    if !det.is_finite() || det.abs() <= 1e-12 * l_ddot.norm() * n_vec.norm() {
        return Err(IodFailureKind::SingularDirectionMatrix.into());
    }
    let a = -obs_ddot.dot(&n_vec) / det;
    let b = -obs.dot(&n_vec) / det;
    let e = l.dot(obs);

    let c6 = -(a * a + 2.0 * a * e + obs.norm_squared());
    let c3 = -2.0 * b * (a + e);
    let c0 = -b * b;
    if descartes_upper_bound_deg8_sparse(c0, c3, c6, 0.0) == 0 {
        return Err(IodFailureKind::NoRootsFound.into());
    }
    let poly = [c0, 0.0, 0.0, c3, 0.0, 0.0, c6, 0.0, 1.0];

    let m_vec = l.cross(l_ddot);
    let rate_denom = 2.0 * l_dot.dot(&m_vec);
    if rate_denom.abs() <= f64::EPSILON {
        return Err(IodFailureKind::IllConditioned("range-rate denominator vanishes").into());
    }

    let r2_range = params.r2_min_km / DISTANCE_UNIT..=params.r2_max_km / DISTANCE_UNIT;
    let mut best: Option<(f64, Vector3<f64>, Vector3<f64>)> = None;

    GaussObs::visit_real_positive_roots(
        &poly,
        params.aberth_max_iter,
        params.aberth_eps,
        params.root_imag_eps,
        |root| {
            if !r2_range.contains(&root) {
                return ControlFlow::Continue(());
            }
            let rho = a + b / root.powi(3);
            if rho < params.min_rho2_km / DISTANCE_UNIT {
                debug!("laplace root r = {root:.6} DU rejected: range {rho:.3e} DU");
                return ControlFlow::Continue(());
            }
            let position = obs + rho * l;
            let r3 = position.norm().powi(3);
            let rho_dot = -(obs.dot(&m_vec) / r3 + obs_ddot.dot(&m_vec)) / rate_denom;
            let velocity = obs_dot + rho_dot * l + rho * l_dot;

            let ecc = eccentricity_vector(&position, &velocity, 1.0).norm();
            if ecc < params.max_eccentricity && best.map_or(true, |(e, _, _)| ecc < e) {
                best = Some((ecc, position, velocity));
            }
            ControlFlow::Continue(())
        },
    )?;

    let (_, position, velocity) = best.ok_or(IodFailureKind::NoRootsFound)?;
    Ok(state_from_canonical(d.epoch, &position, &velocity))
}

/// Laplace method on the first three observations.
#[derive(Debug, Clone, Copy, Default)]
pub struct LaplaceSolver;

impl IodSolver for LaplaceSolver {
    fn name(&self) -> &'static str {
        "laplace"
    }

    fn solve_state(
        &self,
        observations: &[Observation],
        params: &IODParams,
    ) -> Result<StateVector, TleFitError> {
        check_batch(observations, 3)?;
        laplace_state(&three_point_derivatives(&observations[..3]), params)
    }
}

/// Laplace method on every observation, derivatives from a least-squares
/// polynomial of degree `min(N − 1, laplace_fit_degree)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiLaplaceSolver;

impl IodSolver for MultiLaplaceSolver {
    fn name(&self) -> &'static str {
        "multi-laplace"
    }

    fn solve_state(
        &self,
        observations: &[Observation],
        params: &IODParams,
    ) -> Result<StateVector, TleFitError> {
        check_batch(observations, 3)?;
        let degree = (observations.len() - 1).min(params.laplace_fit_degree);
        laplace_state(&fitted_derivatives(observations, degree)?, params)
    }
}
