//! # Circular-orbit approximation
//!
//! Assumes `e ≈ 0` and searches the single orbit radius `a` for which the angle swept
//! between the first and last observed positions equals `n·Δt = sqrt(µ/a³)·Δt`.
//! Each position follows from intersecting the line of sight with the sphere of
//! radius `a`. The velocity at the middle observation is the circular speed,
//! perpendicular to the position, in the plane of `r_first × r_last`.
//!
//! The result is used directly as a solver and as the range seed of Gooding and
//! Double-R.

use log::debug;
use nalgebra::Vector3;
use smallvec::SmallVec;

use crate::constants::{time_unit, DISTANCE_UNIT};
use crate::initial_orbit_determination::{range_to_sphere, state_from_canonical, IODParams, IodSolver};
use crate::observations::{check_batch, Observation};
use crate::orbit_type::StateVector;
use crate::time::seconds_between;
use crate::tlefit_errors::{IodFailureKind, TleFitError};

/// Upper bound of the radius scan, in Earth radii.
const MAX_RADIUS: f64 = 20.0;
const SCAN_SAMPLES: usize = 400;
const BISECTION_MAX_ITER: usize = 200;
const BISECTION_TOL: f64 = 1e-13;

/// Circular orbit matching a batch of observations.
#[derive(Debug, Clone, PartialEq)]
pub struct CircularFit {
    /// Orbit radius in km.
    pub radius_km: f64,
    /// Slant range of every observation, km.
    pub ranges_km: SmallVec<[f64; 6]>,
    /// State at the middle observation.
    pub state: StateVector,
}

struct Geometry {
    observer: Vec<Vector3<f64>>,
    los: Vec<Vector3<f64>>,
    arc: f64,
}

impl Geometry {
    fn positions(&self, radius: f64) -> Option<Vec<Vector3<f64>>> {
        self.observer
            .iter()
            .zip(&self.los)
            .map(|(o, l)| range_to_sphere(o, l, radius).map(|rho| o + rho * l))
            .collect()
    }

    /// Swept angle minus mean-motion angle; `None` when a line of sight misses the sphere.
    fn residual(&self, radius: f64) -> Option<f64> {
        let positions = self.positions(radius)?;
        let first = positions.first()?;
        let last = positions.last()?;
        let swept = first.cross(last).norm().atan2(first.dot(last));
        Some(swept - radius.powf(-1.5) * self.arc)
    }
}

/// Fit a circular orbit to at least two observations.
///
/// The radius is bracketed by a logarithmic scan from the Earth's surface (or the
/// highest observer) outward, then refined by bisection.
///
/// Errors
/// ----------
/// * [`IodFailureKind::NotEnoughObservations`] / [`IodFailureKind::NotChronological`].
/// * [`IodFailureKind::NoCircularSolution`] when no radius matches the observed arc.
pub fn circular_fit(observations: &[Observation]) -> Result<CircularFit, TleFitError> {
    check_batch(observations, 2)?;

    let first = &observations[0];
    let last = &observations[observations.len() - 1];
    let geometry = Geometry {
        observer: observations
            .iter()
            .map(|o| o.observer_position / DISTANCE_UNIT)
            .collect(),
        los: observations.iter().map(Observation::line_of_sight).collect(),
        arc: seconds_between(first.timestamp, last.timestamp) / time_unit(),
    };

    let min_radius = geometry
        .observer
        .iter()
        .map(|o| o.norm())
        .fold(1.0_f64, f64::max)
        * (1.0 + 1e-9);

    let ratio = (MAX_RADIUS / min_radius).ln() / SCAN_SAMPLES as f64;
    let radius_at = |k: usize| min_radius * (ratio * k as f64).exp();

    let mut bracket = None;
    let mut previous = (min_radius, geometry.residual(min_radius));
    for k in 1..=SCAN_SAMPLES {
        let radius = radius_at(k);
        let value = geometry.residual(radius);
        if let (Some(a), Some(b)) = (previous.1, value) {
            if a <= 0.0 && b >= 0.0 {
                bracket = Some((previous.0, radius));
                break;
            }
        }
        previous = (radius, value);
    }
    let (mut low, mut high) = bracket.ok_or(IodFailureKind::NoCircularSolution)?;

    for _ in 0..BISECTION_MAX_ITER {
        let mid = 0.5 * (low + high);
        match geometry.residual(mid) {
            Some(v) if v < 0.0 => low = mid,
            Some(_) => high = mid,
            None => return Err(IodFailureKind::NoCircularSolution.into()),
        }
        if high - low < BISECTION_TOL * high {
            break;
        }
    }
    let radius = 0.5 * (low + high);

    let positions = geometry
        .positions(radius)
        .ok_or(IodFailureKind::NoCircularSolution)?;
    let ranges_km = positions
        .iter()
        .zip(&geometry.observer)
        .map(|(p, o)| (p - o).norm() * DISTANCE_UNIT)
        .collect();

    let normal = positions[0].cross(&positions[positions.len() - 1]);
    if normal.norm() <= f64::EPSILON {
        return Err(IodFailureKind::DegenerateTransferAngle.into());
    }
    let mid = observations.len() / 2;
    let r_mid = positions[mid];
    let velocity = normal.normalize().cross(&r_mid.normalize()) / radius.sqrt();

    debug!("circular fit radius = {:.3} km", radius * DISTANCE_UNIT);
    Ok(CircularFit {
        radius_km: radius * DISTANCE_UNIT,
        ranges_km,
        state: state_from_canonical(observations[mid].timestamp, &r_mid, &velocity),
    })
}

/// Circular approximation; accepts two observations.
#[derive(Debug, Clone, Copy, Default)]
pub struct CircularSolver;

impl IodSolver for CircularSolver {
    fn name(&self) -> &'static str {
        "circular"
    }

    fn min_observations(&self) -> usize {
        2
    }

    fn solve_state(
        &self,
        observations: &[Observation],
        _params: &IODParams,
    ) -> Result<StateVector, TleFitError> {
        Ok(circular_fit(observations)?.state)
    }
}
