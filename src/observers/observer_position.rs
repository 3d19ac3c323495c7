use hifitime::Epoch;
use nalgebra::Vector3;

use crate::constants::{Degree, Kilometer, Meter, EARTH_MAJOR_AXIS, EARTH_MINOR_AXIS, RADEG};
use crate::ref_system::ecef_to_inertial;
use crate::time::gmst_at;

/// Convert geodetic latitude and height into normalized geocentric parallax coordinates.
///
/// The WGS84 ellipsoid is used through its axis ratio `b/a`, expressed through the
/// parametric (reduced) latitude `u`.
///
/// Arguments
/// -----------------
/// * `lat`: geodetic latitude in radians.
/// * `height`: height above the ellipsoid in kilometers.
///
/// Return
/// ----------
/// * `(ρ·cosφ', ρ·sinφ')` in Earth equatorial radii, `φ'` being the geocentric latitude.
pub(crate) fn lat_alt_to_parallax(lat: f64, height: Kilometer) -> (f64, f64) {
    let axis_ratio = EARTH_MINOR_AXIS / EARTH_MAJOR_AXIS;

    let u = (lat.sin() * axis_ratio).atan2(lat.cos());

    let rho_sin_phi = axis_ratio * u.sin() + (height / EARTH_MAJOR_AXIS) * lat.sin();
    let rho_cos_phi = u.cos() + (height / EARTH_MAJOR_AXIS) * lat.cos();

    (rho_cos_phi, rho_sin_phi)
}

/// Earth-fixed Cartesian position (km) of a geodetic site.
///
/// Arguments
/// -----------------
/// * `lat_deg`: geodetic latitude in degrees.
/// * `lon_deg`: east longitude in degrees.
/// * `elevation_m`: height above the WGS84 ellipsoid in meters.
pub fn geodetic_to_ecef(lat_deg: Degree, lon_deg: Degree, elevation_m: Meter) -> Vector3<f64> {
    let (rho_cos_phi, rho_sin_phi) = lat_alt_to_parallax(lat_deg * RADEG, elevation_m / 1000.0);
    let lon = lon_deg * RADEG;
    Vector3::new(
        EARTH_MAJOR_AXIS * rho_cos_phi * lon.cos(),
        EARTH_MAJOR_AXIS * rho_cos_phi * lon.sin(),
        EARTH_MAJOR_AXIS * rho_sin_phi,
    )
}

/// Inertial (TEME-aligned) position in km of a geodetic site at `epoch`.
///
/// The Earth-fixed vector is rotated by the IAU 1982 GMST of [`gmst_at`]; the same
/// rotation is used when residuals are evaluated against SGP4 output.
pub fn geodetic_to_eci(
    lat_deg: Degree,
    lon_deg: Degree,
    elevation_m: Meter,
    epoch: Epoch,
) -> Vector3<f64> {
    ecef_to_inertial(gmst_at(epoch)) * geodetic_to_ecef(lat_deg, lon_deg, elevation_m)
}

#[cfg(test)]
mod observer_position_test {
    use super::*;
    use crate::time::parse_utc;
    use approx::assert_relative_eq;

    #[test]
    fn test_lat_alt_to_parallax() {
        // equator, sea level: on the equatorial radius
        let (c, s) = lat_alt_to_parallax(0.0, 0.0);
        assert_relative_eq!(c, 1.0, epsilon = 1e-15);
        assert_relative_eq!(s, 0.0, epsilon = 1e-15);

        // pole: on the polar radius
        let (c, s) = lat_alt_to_parallax(std::f64::consts::FRAC_PI_2, 0.0);
        assert_relative_eq!(c, 0.0, epsilon = 1e-15);
        assert_relative_eq!(s, EARTH_MINOR_AXIS / EARTH_MAJOR_AXIS, epsilon = 1e-15);
    }

    #[test]
    fn ecef_matches_closed_form_wgs84() {
        // closed form with the prime vertical radius N
        let (lat, lon, h) = (48.8566_f64, 2.3522_f64, 35.0_f64);
        let e2 = 1.0 - (EARTH_MINOR_AXIS / EARTH_MAJOR_AXIS).powi(2);
        let (sl, cl) = (lat * RADEG).sin_cos();
        let n = EARTH_MAJOR_AXIS / (1.0 - e2 * sl * sl).sqrt();
        let hk = h / 1000.0;
        let expected = Vector3::new(
            (n + hk) * cl * (lon * RADEG).cos(),
            (n + hk) * cl * (lon * RADEG).sin(),
            (n * (1.0 - e2) + hk) * sl,
        );
        assert_relative_eq!(geodetic_to_ecef(lat, lon, h), expected, epsilon = 1e-9);
    }

    #[test]
    fn eci_preserves_geocentric_distance_and_latitude() {
        let t = parse_utc("2024-03-20T03:00:00").unwrap();
        let ecef = geodetic_to_ecef(-33.9, 18.4, 1200.0);
        let eci = geodetic_to_eci(-33.9, 18.4, 1200.0, t);
        assert_relative_eq!(eci.norm(), ecef.norm(), epsilon = 1e-9);
        assert_relative_eq!(eci.z, ecef.z, epsilon = 1e-12);
    }
}
