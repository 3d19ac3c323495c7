//! # Averaging of orbit solutions
//!
//! Several IOD solutions of the same object (one per observation window) are merged
//! into a single element set:
//!
//! - angles that wrap (`i`, `Ω`, `ω`, argument of latitude) use the circular mean
//!   `atan2(mean sin, mean cos)`;
//! - `a` and `e` use the arithmetic mean;
//! - every set is first moved to a common epoch by Keplerian drift.
//!
//! The anomaly is averaged through the argument of latitude `u = ω + ν`, which stays
//! well defined for near-circular orbits where ω itself is noisy.

use hifitime::Epoch;
use std::collections::BTreeMap;

use crate::constants::{Degree, MU_EARTH, RADEG};
use crate::orbit_type::OrbitalElementSet;
use crate::time::{add_seconds, seconds_between};
use crate::tlefit_errors::{IodFailureKind, TleFitError};

/// Arithmetic mean; `None` for an empty slice.
pub fn arithmetic_mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Circular mean of angles in degrees, in `[0, 360)`; `None` for an empty slice.
///
/// The mean of 350° and 10° is 0°, not 180°.
pub fn circular_mean_deg(angles: &[Degree]) -> Option<Degree> {
    if angles.is_empty() {
        return None;
    }
    let (sin_sum, cos_sum) = angles.iter().fold((0.0, 0.0), |(s, c), a| {
        let (sa, ca) = (a * RADEG).sin_cos();
        (s + sa, c + ca)
    });
    let mean = sin_sum.atan2(cos_sum) / RADEG;
    let wrapped = mean.rem_euclid(360.0);
    Some(if wrapped >= 360.0 { 0.0 } else { wrapped })
}

/// Mean range per virtual point index.
pub fn mean_ranges(ranges: &BTreeMap<usize, Vec<f64>>) -> BTreeMap<usize, f64> {
    ranges
        .iter()
        .filter_map(|(idx, values)| arithmetic_mean(values).map(|m| (*idx, m)))
        .collect()
}

/// Mean epoch of a non-empty batch of element sets.
pub fn mean_epoch(sets: &[OrbitalElementSet]) -> Option<Epoch> {
    let first = sets.first()?.epoch;
    let offsets: Vec<f64> = sets
        .iter()
        .map(|s| seconds_between(first, s.epoch))
        .collect();
    arithmetic_mean(&offsets).map(|dt| add_seconds(first, dt))
}

/// Average element sets at `reference_epoch` (the mean epoch when `None`).
///
/// Errors
/// ----------
/// * [`IodFailureKind::NotEnoughObservations`] for an empty batch.
/// * Propagation errors of [`OrbitalElementSet::propagate_to`].
pub fn mean_elements(
    sets: &[OrbitalElementSet],
    reference_epoch: Option<Epoch>,
) -> Result<OrbitalElementSet, TleFitError> {
    let epoch = match reference_epoch {
        Some(epoch) => epoch,
        None => mean_epoch(sets).ok_or(IodFailureKind::NotEnoughObservations {
            expected: 1,
            got: 0,
        })?,
    };
    if sets.is_empty() {
        return Err(IodFailureKind::NotEnoughObservations {
            expected: 1,
            got: 0,
        }
        .into());
    }

    let moved = sets
        .iter()
        .map(|s| s.propagate_to(epoch, MU_EARTH))
        .collect::<Result<Vec<_>, _>>()?;

    let column = |f: fn(&OrbitalElementSet) -> f64| moved.iter().map(f).collect::<Vec<_>>();
    let none = || TleFitError::from(IodFailureKind::NotEnoughObservations { expected: 1, got: 0 });

    let a = arithmetic_mean(&column(|s| s.semi_major_axis_km)).ok_or_else(none)?;
    let e = arithmetic_mean(&column(|s| s.eccentricity)).ok_or_else(none)?;
    let i = circular_mean_deg(&column(|s| s.inclination_deg)).ok_or_else(none)?;
    let raan = circular_mean_deg(&column(|s| s.raan_deg)).ok_or_else(none)?;
    let omega = circular_mean_deg(&column(|s| s.arg_perigee_deg)).ok_or_else(none)?;
    let u = circular_mean_deg(&column(|s| s.argument_of_latitude_deg())).ok_or_else(none)?;

    OrbitalElementSet::new(epoch, a, e, i, raan, omega, u - omega)
}

#[cfg(test)]
mod consensus_test {
    use super::*;
    use crate::conversion::wrap_deg_180;
    use crate::time::parse_utc;
    use approx::assert_relative_eq;

    fn assert_same_angle(a: f64, b: f64) {
        assert!(wrap_deg_180(a - b).abs() < 1e-9, "{a} != {b}");
    }

    fn set(epoch: Epoch, raan: f64, omega: f64, nu: f64) -> OrbitalElementSet {
        OrbitalElementSet::new(epoch, 6_771.0, 0.001, 51.6, raan, omega, nu).unwrap()
    }

    #[test]
    fn means_of_empty_input() {
        assert_eq!(arithmetic_mean(&[]), None);
        assert_eq!(circular_mean_deg(&[]), None);
        assert!(mean_elements(&[], None).is_err());
    }

    #[test]
    fn circular_mean_wraps() {
        assert_same_angle(circular_mean_deg(&[350.0, 10.0]).unwrap(), 0.0);
        assert_relative_eq!(circular_mean_deg(&[170.0, 190.0]).unwrap(), 180.0, epsilon = 1e-9);
        assert_relative_eq!(circular_mean_deg(&[-30.0]).unwrap(), 330.0, epsilon = 1e-9);
        assert_relative_eq!(arithmetic_mean(&[1.0, 2.0, 6.0]).unwrap(), 3.0);
    }

    #[test]
    fn circular_mean_close_to_zero() {
        let mean = circular_mean_deg(&[359.9, 0.1]).unwrap();
        assert!(mean.min(360.0 - mean) < 1e-9, "{mean}");
        let mean = circular_mean_deg(&[359.9, 0.1, 0.1, 359.9]).unwrap();
        assert!(mean.min(360.0 - mean) < 1e-9, "{mean}");
    }

    #[test]
    fn copies_average_to_themselves() {
        let t0 = parse_utc("2024-06-01T02:00:00").unwrap();
        let one = set(t0, 247.4627, 130.536, 195.3);
        let mean = mean_elements(&[one; 5], None).unwrap();

        assert_eq!(mean.epoch, t0);
        assert_relative_eq!(mean.semi_major_axis_km, one.semi_major_axis_km, epsilon = 1e-9);
        assert_relative_eq!(mean.eccentricity, one.eccentricity, epsilon = 1e-12);
        assert_relative_eq!(mean.inclination_deg, one.inclination_deg, epsilon = 1e-9);
        assert_same_angle(mean.raan_deg, one.raan_deg);
        assert_same_angle(mean.arg_perigee_deg, one.arg_perigee_deg);
        assert_same_angle(mean.true_anomaly_deg, one.true_anomaly_deg);
    }

    #[test]
    fn ranges_per_index() {
        let mut ranges = BTreeMap::new();
        ranges.insert(1, vec![800.0, 810.0, 790.0]);
        ranges.insert(2, vec![700.0]);
        ranges.insert(3, vec![]);
        let means = mean_ranges(&ranges);
        assert_eq!(means.len(), 2);
        assert_relative_eq!(means[&1], 800.0);
        assert_relative_eq!(means[&2], 700.0);
    }

    #[test]
    fn elements_across_the_wrap() {
        let t0 = parse_utc("2024-06-01T02:00:00").unwrap();
        let sets = [set(t0, 359.0, 90.0, 10.0), set(t0, 1.0, 90.0, 12.0)];
        let mean = mean_elements(&sets, None).unwrap();
        assert_eq!(mean.epoch, t0);
        assert_same_angle(mean.raan_deg, 0.0);
        assert!(mean.raan_deg < 360.0);
        assert_relative_eq!(mean.argument_of_latitude_deg(), 101.0, epsilon = 1e-6);
        assert_relative_eq!(mean.semi_major_axis_km, 6_771.0);
    }

    #[test]
    fn sets_are_moved_to_the_mean_epoch() {
        let t0 = parse_utc("2024-06-01T02:00:00").unwrap();
        let base = set(t0, 40.0, 0.0, 5.0);
        let later = base.propagate_to(add_seconds(t0, 120.0), MU_EARTH).unwrap();

        let mean = mean_elements(&[base, later], None).unwrap();
        let expected = base.propagate_to(add_seconds(t0, 60.0), MU_EARTH).unwrap();
        assert_eq!(mean.epoch, add_seconds(t0, 60.0));
        assert_relative_eq!(mean.true_anomaly_deg, expected.true_anomaly_deg, epsilon = 1e-8);

        let at_start = mean_elements(&[base, later], Some(t0)).unwrap();
        assert_relative_eq!(at_start.true_anomaly_deg, 5.0, epsilon = 1e-8);
    }
}
