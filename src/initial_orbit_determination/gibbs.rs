//! # Velocity from three position vectors
//!
//! - [`gibbs`]: classical Gibbs method, exact for coplanar positions on a conic.
//! - [`herrick_gibbs`]: Taylor-series variant for closely spaced positions, where
//!   Gibbs loses precision.
//! - [`velocity_from_positions`]: picks between the two from the angular separation.
//!
//! All functions take `µ` explicitly (canonical units inside the Gauss solver, km/s
//! for radar triplets).

use log::debug;
use nalgebra::Vector3;

use crate::constants::{Seconds, RADEG};
use crate::initial_orbit_determination::IODParams;
use crate::tlefit_errors::{IodFailureKind, TleFitError};

/// Smallest sine of the r1–r3 separation accepted by [`velocity_from_positions`].
const MIN_TRANSFER_SINE: f64 = 1e-3;

fn angle_between(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    a.cross(b).norm().atan2(a.dot(b))
}

/// Gibbs' method: velocity at `r2` from three coplanar positions.
///
/// Arguments
/// -----------------
/// * `r1`, `r2`, `r3`: successive positions on the orbit.
/// * `mu`: gravitational parameter in the units of the positions.
/// * `coplanarity_tol`: maximum `|r̂1·(r̂2×r̂3)|` accepted, as the sine of an angle.
///
/// Errors
/// ----------
/// * [`IodFailureKind::NonCoplanarPositions`] when the positions leave the plane.
/// * [`IodFailureKind::DegenerateTransferAngle`] for collinear or opposite vectors.
pub fn gibbs(
    r1: &Vector3<f64>,
    r2: &Vector3<f64>,
    r3: &Vector3<f64>,
    mu: f64,
    coplanarity_tol: f64,
) -> Result<Vector3<f64>, IodFailureKind> {
    let (n1, n2, n3) = (r1.norm(), r2.norm(), r3.norm());

    let z23 = r2.cross(r3);
    let z31 = r3.cross(r1);
    let z12 = r1.cross(r2);
    if z23.norm() <= f64::EPSILON * n2 * n3 {
        return Err(IodFailureKind::DegenerateTransferAngle);
    }

    let coplanarity = (r1 / n1).dot(&z23.normalize());
    if coplanarity.abs() > coplanarity_tol {
        return Err(IodFailureKind::NonCoplanarPositions(coplanarity));
    }

    let n_vec = n1 * z23 + n2 * z31 + n3 * z12;
    let d_vec = z12 + z23 + z31;
    let s_vec = (n2 - n3) * r1 + (n3 - n1) * r2 + (n1 - n2) * r3;

    let nd = n_vec.dot(&d_vec);
    if !(nd > 0.0) || d_vec.norm() <= f64::EPSILON * n1 * n3 {
        return Err(IodFailureKind::DegenerateTransferAngle);
    }

    let scale = (mu / nd).sqrt();
    Ok(scale * (d_vec.cross(r2) / n2 + s_vec))
}

/// Herrick-Gibbs velocity at `r2` for closely spaced positions.
///
/// `t1`, `t2`, `t3` are the epochs of the positions in any common time origin.
pub fn herrick_gibbs(
    r1: &Vector3<f64>,
    r2: &Vector3<f64>,
    r3: &Vector3<f64>,
    t1: Seconds,
    t2: Seconds,
    t3: Seconds,
    mu: f64,
) -> Result<Vector3<f64>, IodFailureKind> {
    let dt21 = t2 - t1;
    let dt32 = t3 - t2;
    let dt31 = t3 - t1;
    if !(dt21 > 0.0 && dt32 > 0.0) {
        return Err(IodFailureKind::NotChronological);
    }

    let r1m3 = 1.0 / r1.norm().powi(3);
    let r2m3 = 1.0 / r2.norm().powi(3);
    let r3m3 = 1.0 / r3.norm().powi(3);

    let d1 = -dt32 * (1.0 / (dt21 * dt31) + mu * r1m3 / 12.0);
    let d2 = (dt32 - dt21) * (1.0 / (dt21 * dt32) + mu * r2m3 / 12.0);
    let d3 = dt21 * (1.0 / (dt32 * dt31) + mu * r3m3 / 12.0);

    Ok(d1 * r1 + d2 * r2 + d3 * r3)
}

/// Velocity at the middle of three positions, choosing Gibbs or Herrick-Gibbs.
///
/// Herrick-Gibbs is used when both separations are below
/// `params.herrick_gibbs_max_angle_deg`. Transfers close to 180° (or 0°) between
/// `r1` and `r3` are rejected, as are non-coplanar triplets.
pub fn velocity_from_positions(
    positions: [&Vector3<f64>; 3],
    times: [Seconds; 3],
    mu: f64,
    params: &IODParams,
) -> Result<Vector3<f64>, TleFitError> {
    let [r1, r2, r3] = positions;

    let theta12 = angle_between(r1, r2);
    let theta23 = angle_between(r2, r3);
    let theta13 = angle_between(r1, r3);
    if theta13.sin() < MIN_TRANSFER_SINE && (theta12 + theta23) > 0.5 * std::f64::consts::PI {
        return Err(IodFailureKind::DegenerateTransferAngle.into());
    }

    let coplanarity_tol = (params.coplanarity_tol_deg * RADEG).sin();
    let z23 = r2.cross(r3);
    if z23.norm() > 0.0 {
        let coplanarity = r1.normalize().dot(&z23.normalize());
        if coplanarity.abs() > coplanarity_tol {
            return Err(IodFailureKind::NonCoplanarPositions(coplanarity).into());
        }
    }

    let hg_limit = params.herrick_gibbs_max_angle_deg * RADEG;
    let velocity = if theta12 < hg_limit && theta23 < hg_limit {
        debug!(
            "Herrick-Gibbs velocity (separations {:.4}°, {:.4}°)",
            theta12 / RADEG,
            theta23 / RADEG
        );
        herrick_gibbs(r1, r2, r3, times[0], times[1], times[2], mu)?
    } else {
        gibbs(r1, r2, r3, mu, coplanarity_tol)?
    };
    Ok(velocity)
}

#[cfg(test)]
mod gibbs_test {
    use super::*;
    use crate::constants::MU_EARTH;
    use crate::kepler::propagate;
    use approx::assert_relative_eq;

    // Vallado, Example 7-3
    fn vallado_positions() -> [Vector3<f64>; 3] {
        [
            Vector3::new(0.0, 0.0, 6378.137),
            Vector3::new(0.0, -4464.696, -5102.509),
            Vector3::new(0.0, 5740.323, 3189.068),
        ]
    }

    #[test]
    fn test_gibbs_vallado() {
        let [r1, r2, r3] = vallado_positions();
        let v2 = gibbs(&r1, &r2, &r3, MU_EARTH, 0.05).unwrap();
        assert_relative_eq!(v2, Vector3::new(0.0, 5.5311, -5.1918), epsilon = 1e-3);
    }

    #[test]
    fn gibbs_reproduces_keplerian_velocity() {
        let r0 = Vector3::new(-6045.0, -3490.0, 2500.0);
        let v0 = Vector3::new(-3.457, 6.618, 2.533);
        let (r1, _) = propagate(&r0, &v0, -900.0, MU_EARTH).unwrap();
        let (r3, _) = propagate(&r0, &v0, 900.0, MU_EARTH).unwrap();
        let v2 = gibbs(&r1, &r0, &r3, MU_EARTH, 1e-6).unwrap();
        assert_relative_eq!(v2, v0, epsilon = 1e-8);
    }

    #[test]
    fn herrick_gibbs_on_short_arc() {
        let r0 = Vector3::new(-6045.0, -3490.0, 2500.0);
        let v0 = Vector3::new(-3.457, 6.618, 2.533);
        // separations stay below the 1° Herrick-Gibbs limit
        let (r1, _) = propagate(&r0, &v0, -10.0, MU_EARTH).unwrap();
        let (r3, _) = propagate(&r0, &v0, 12.0, MU_EARTH).unwrap();
        let v2 = herrick_gibbs(&r1, &r0, &r3, -10.0, 0.0, 12.0, MU_EARTH).unwrap();
        assert_relative_eq!(v2, v0, epsilon = 1e-5);

        let params = IODParams::default();
        let v = velocity_from_positions([&r1, &r0, &r3], [-10.0, 0.0, 12.0], MU_EARTH, &params)
            .unwrap();
        assert_relative_eq!(v, v2, epsilon = 1e-14);
    }

    #[test]
    fn non_coplanar_positions_are_rejected() {
        let [r1, r2, mut r3] = vallado_positions();
        r3.x = 2000.0;
        assert!(matches!(
            gibbs(&r1, &r2, &r3, MU_EARTH, 0.01),
            Err(IodFailureKind::NonCoplanarPositions(_))
        ));
    }

    #[test]
    fn opposite_positions_are_degenerate() {
        let r1 = Vector3::new(7000.0, 0.0, 0.0);
        let r2 = Vector3::new(0.0, 7000.0, 0.0);
        let r3 = Vector3::new(-7000.0, 1e-6, 0.0);
        let err = velocity_from_positions(
            [&r1, &r2, &r3],
            [-1000.0, 0.0, 1000.0],
            MU_EARTH,
            &IODParams::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            TleFitError::IodFailure(IodFailureKind::DegenerateTransferAngle)
        );
    }
}
