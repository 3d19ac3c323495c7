//! Lambert's problem with universal variables (single revolution, short way).
//!
//! Bisection on the universal variable `ψ` until the time of flight matches, after
//! Vallado, *Fundamentals of Astrodynamics and Applications*, Algorithm 58.

use nalgebra::Vector3;

use crate::tlefit_errors::IodFailureKind;

const PSI_UPPER: f64 = 4.0 * std::f64::consts::PI * std::f64::consts::PI;
const PSI_LOWER: f64 = -4.0 * std::f64::consts::PI;
const MAX_ITER: usize = 500;
const TOF_TOL: f64 = 1e-12;

/// Stumpff functions `c2(ψ)`, `c3(ψ)`.
fn stumpff(psi: f64) -> (f64, f64) {
    if psi > 1e-6 {
        let sq = psi.sqrt();
        ((1.0 - sq.cos()) / psi, (sq - sq.sin()) / (sq * psi))
    } else if psi < -1e-6 {
        let sq = (-psi).sqrt();
        ((1.0 - sq.cosh()) / psi, (sq.sinh() - sq) / (sq * -psi))
    } else {
        (0.5 - psi / 24.0, 1.0 / 6.0 - psi / 120.0)
    }
}

/// Velocities at both ends of the short-way transfer from `r1` to `r2` in `dt`.
///
/// Errors
/// ----------
/// * [`IodFailureKind::DegenerateTransferAngle`] for (anti)collinear positions.
/// * [`IodFailureKind::LambertFailure`] for a non-positive time of flight.
/// * [`IodFailureKind::NoConvergence`] if the bisection does not converge.
pub fn lambert(
    r1: &Vector3<f64>,
    r2: &Vector3<f64>,
    dt: f64,
    mu: f64,
) -> Result<(Vector3<f64>, Vector3<f64>), IodFailureKind> {
    if !(dt > 0.0) || !dt.is_finite() {
        return Err(IodFailureKind::LambertFailure);
    }
    let (n1, n2) = (r1.norm(), r2.norm());
    let cos_dnu = r1.dot(r2) / (n1 * n2);
    let a = (n1 * n2 * (1.0 + cos_dnu)).sqrt();
    if !(a > 1e-10 * (n1 + n2)) || r1.cross(r2).norm() <= f64::EPSILON * n1 * n2 {
        return Err(IodFailureKind::DegenerateTransferAngle);
    }

    let sqrt_mu = mu.sqrt();
    let (mut low, mut up) = (PSI_LOWER, PSI_UPPER);
    let mut psi = 0.0;

    for _ in 0..MAX_ITER {
        let (c2, c3) = stumpff(psi);
        let y = n1 + n2 + a * (psi * c3 - 1.0) / c2.sqrt();
        if y < 0.0 {
            low = psi;
            psi = 0.5 * (low + up);
            continue;
        }

        let chi = (y / c2).sqrt();
        let tof = (chi.powi(3) * c3 + a * y.sqrt()) / sqrt_mu;

        if (tof - dt).abs() <= TOF_TOL * dt || (up - low).abs() <= f64::EPSILON * up.abs() {
            let f = 1.0 - y / n1;
            let g = a * (y / mu).sqrt();
            let gdot = 1.0 - y / n2;
            return Ok(((r2 - f * r1) / g, (gdot * r2 - r1) / g));
        }

        if tof <= dt {
            low = psi;
        } else {
            up = psi;
        }
        psi = 0.5 * (low + up);
    }

    Err(IodFailureKind::NoConvergence {
        method: "lambert",
        iterations: MAX_ITER,
    })
}
