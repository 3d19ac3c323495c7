//! Reference-frame rotations and spherical ↔ Cartesian conversions in radians.
//!
//! The inertial frame used throughout the crate is the true-equator mean-equinox frame
//! (TEME) of SGP4. Observer positions are rotated from the Earth-fixed frame with the
//! IAU 1982 Greenwich mean sidereal time, which is the rotation SGP4 itself assumes.

use nalgebra::{Matrix3, Rotation3, Vector3};

use crate::constants::{Radian, DPI};
use crate::tlefit_errors::TleFitError;

/// Coordinate axis of an elementary rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationAxis {
    X,
    Y,
    Z,
}

/// Elementary rotation matrix of angle `alpha` about `axis`.
///
/// The matrix rotates vectors actively (counter-clockwise when looking down the axis).
/// Its transpose performs the inverse frame change.
///
/// Arguments
/// -----------------
/// * `alpha`: rotation angle in radians.
/// * `axis`: rotation axis.
///
/// Return
/// ----------
/// * The `3×3` rotation matrix.
pub fn rotmt(alpha: Radian, axis: RotationAxis) -> Matrix3<f64> {
    let axis = match axis {
        RotationAxis::X => Vector3::x_axis(),
        RotationAxis::Y => Vector3::y_axis(),
        RotationAxis::Z => Vector3::z_axis(),
    };

    Rotation3::from_axis_angle(&axis, alpha).into()
}

/// Unit direction vector pointing toward `(ra, dec)`.
///
/// Components are `(cos ra cos dec, sin ra cos dec, sin dec)`.
#[inline]
pub fn radec_to_unit_vector(ra: Radian, dec: Radian) -> Vector3<f64> {
    let cos_dec = dec.cos();
    Vector3::new(ra.cos() * cos_dec, ra.sin() * cos_dec, dec.sin())
}

/// Convert a Cartesian vector to right ascension, declination and norm.
///
/// Arguments
/// ---------
/// * `cartesian_position`: any Cartesian vector, units are preserved in the returned norm.
///
/// Returns
/// --------
/// * `(α, δ, ρ)` with `α ∈ [0, 2π)`, `δ ∈ [−π/2, π/2]` and `ρ` the Euclidean norm.
///
/// Errors
/// -------
/// * [`TleFitError::DegenerateVector`] when the norm is not strictly positive and finite.
pub fn cartesian_to_radec(
    cartesian_position: &Vector3<f64>,
) -> Result<(Radian, Radian, f64), TleFitError> {
    let pos_norm = cartesian_position.norm();
    if !pos_norm.is_finite() || pos_norm <= f64::EPSILON {
        return Err(TleFitError::DegenerateVector);
    }

    let delta = (cartesian_position.z / pos_norm).clamp(-1.0, 1.0).asin();

    // atan2 keeps the quadrant; on the poles it returns 0.
    let alpha = cartesian_position
        .y
        .atan2(cartesian_position.x)
        .rem_euclid(DPI);
    Ok((alpha, delta, pos_norm))
}

/// Rotation from the topocentric South-East-Zenith frame to the Earth-fixed frame.
///
/// Arguments
/// -----------------
/// * `lat`: geodetic latitude of the site in radians.
/// * `lon`: east longitude of the site in radians.
pub fn sez_to_ecef(lat: Radian, lon: Radian) -> Matrix3<f64> {
    let (sin_lat, cos_lat) = lat.sin_cos();
    let (sin_lon, cos_lon) = lon.sin_cos();

    // Columns are the S, E and Z unit vectors expressed in Earth-fixed coordinates.
    Matrix3::new(
        sin_lat * cos_lon,
        -sin_lon,
        cos_lat * cos_lon,
        sin_lat * sin_lon,
        cos_lon,
        cos_lat * sin_lon,
        -cos_lat,
        0.0,
        sin_lat,
    )
}

/// Rotation from the Earth-fixed frame to the inertial frame at sidereal angle `theta`.
#[inline]
pub fn ecef_to_inertial(theta: Radian) -> Matrix3<f64> {
    rotmt(theta, RotationAxis::Z)
}

#[cfg(test)]
mod ref_system_test {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn rotation_about_z() {
        let rot = rotmt(FRAC_PI_2, RotationAxis::Z);
        let v = rot * Vector3::x();
        assert_relative_eq!(v, Vector3::y(), epsilon = 1e-15);
        // transpose undoes the rotation
        assert_relative_eq!(rot.transpose() * v, Vector3::x(), epsilon = 1e-15);
    }

    #[test]
    fn radec_round_trip() {
        let (ra, dec) = (4.2, -0.7);
        let u = radec_to_unit_vector(ra, dec) * 42.0;
        let (alpha, delta, rho) = cartesian_to_radec(&u).unwrap();
        assert_relative_eq!(alpha, ra, epsilon = 1e-13);
        assert_relative_eq!(delta, dec, epsilon = 1e-13);
        assert_relative_eq!(rho, 42.0, epsilon = 1e-12);
    }

    #[test]
    fn zero_vector_is_degenerate() {
        assert_eq!(
            cartesian_to_radec(&Vector3::zeros()),
            Err(TleFitError::DegenerateVector)
        );
        assert!(cartesian_to_radec(&Vector3::new(f64::NAN, 0.0, 0.0)).is_err());
    }

    #[test]
    fn sez_basis_is_orthonormal() {
        let m = sez_to_ecef(0.8, -1.9);
        assert_relative_eq!(m.transpose() * m, Matrix3::identity(), epsilon = 1e-15);
        // Zenith of a site on the equator at longitude 0 is +X.
        let eq = sez_to_ecef(0.0, 0.0);
        assert_relative_eq!(eq * Vector3::z(), Vector3::x(), epsilon = 1e-15);
        // East is +Y there, South is -Z.
        assert_relative_eq!(eq * Vector3::y(), Vector3::y(), epsilon = 1e-15);
        assert_relative_eq!(eq * Vector3::x(), -Vector3::z(), epsilon = 1e-15);
    }
}
