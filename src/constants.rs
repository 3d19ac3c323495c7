//! # Constants and type definitions for tlefit
//!
//! This module centralizes the **physical constants**, **conversion factors**, and **common type
//! definitions** shared by the whole crate.
//!
//! ## Overview
//!
//! - Earth gravitational parameter and WGS84 ellipsoid
//! - Canonical Earth units used inside the angles-only solvers
//! - Unit conversions (degrees ↔ radians, days ↔ seconds, arcseconds ↔ degrees)
//! - Core type aliases used across the crate
//!
//! Every solver works in **kilometers and seconds**; meters only appear at the
//! boundary (observer elevation, CSV inputs) and are converted immediately.

// -------------------------------------------------------------------------------------------------
// Physical constants and unit conversions
// -------------------------------------------------------------------------------------------------

/// 2π, useful for trigonometric conversions
pub const DPI: f64 = 2. * std::f64::consts::PI;

/// Number of seconds in a day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// MJD epoch of J2000.0 (2000-01-01 12:00:00)
pub const T2000: f64 = 51544.5;

/// Degrees → radians
pub const RADEG: f64 = std::f64::consts::PI / 180.0;

/// Arcseconds → degrees
pub const ARCSEC_TO_DEG: f64 = 1.0 / 3600.0;

/// Earth gravitational parameter µ in km³/s²
pub const MU_EARTH: f64 = 398_600.4418;

/// Earth equatorial radius in km (WGS84)
pub const EARTH_MAJOR_AXIS: f64 = 6_378.137;

/// Earth polar radius in km (WGS84)
pub const EARTH_MINOR_AXIS: f64 = 6_356.752_3;

/// Earth rotation rate in rad/s
pub const EARTH_ROTATION_RATE: f64 = 7.292_115_146_706_979e-5;

/// Canonical distance unit used by the angles-only solvers (one Earth radius, km)
pub const DISTANCE_UNIT: f64 = EARTH_MAJOR_AXIS;

/// Canonical time unit in seconds, `sqrt(DU³ / µ)`, so that µ = 1 in canonical units.
#[inline]
pub fn time_unit() -> f64 {
    (DISTANCE_UNIT.powi(3) / MU_EARTH).sqrt()
}

/// Canonical velocity unit in km/s (`DU / TU`)
#[inline]
pub fn velocity_unit() -> f64 {
    DISTANCE_UNIT / time_unit()
}

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in degrees
pub type Degree = f64;
/// Angle in radians
pub type Radian = f64;
/// Distance in kilometers
pub type Kilometer = f64;
/// Distance in meters
pub type Meter = f64;
/// Time interval in seconds
pub type Seconds = f64;

#[cfg(test)]
mod constants_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn canonical_units_are_consistent() {
        // 1 DU/TU is the circular speed at one Earth radius.
        let v_circ = (MU_EARTH / EARTH_MAJOR_AXIS).sqrt();
        assert_relative_eq!(velocity_unit(), v_circ, epsilon = 1e-12);
        assert_relative_eq!(time_unit(), 806.811, epsilon = 1e-2);
    }
}
