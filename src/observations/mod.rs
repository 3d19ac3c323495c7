//! # Observations
//!
//! An [`Observation`] is one time-tagged angular measurement of the satellite together
//! with the inertial position of the sensor at that instant. Radar-derived
//! measurements additionally carry the slant range.
//!
//! ## Conventions
//!
//! - `timestamp`: UTC [`Epoch`] (nanosecond storage, microsecond-level inputs are exact).
//! - `ra`, `dec`: **degrees**, topocentric, in the TEME-aligned inertial frame of
//!   [`crate::observers`].
//! - `observer_position`: **km**. Constructors taking meters convert at the boundary.
//!
//! ## Submodules
//!
//! - [`csv_reader`](crate::observations::csv_reader): ingestion of observation tables.

use hifitime::Epoch;
use nalgebra::Vector3;

use crate::constants::{Degree, Kilometer};
use crate::conversion::{ra_dec_to_eci, xyz_to_radec};
use crate::observers::GroundStation;
use crate::tlefit_errors::{IodFailureKind, TleFitError};

pub mod csv_reader;

/// A time-tagged line-of-sight measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub timestamp: Epoch,
    pub ra: Degree,
    pub dec: Degree,
    pub observer_position: Vector3<f64>,
    pub range: Option<Kilometer>,
}

impl Observation {
    /// Build an angles-only observation.
    ///
    /// Arguments
    /// -----------------
    /// * `timestamp`: UTC epoch of the measurement.
    /// * `ra`: right ascension in degrees, normalized into `[0, 360)`.
    /// * `dec`: declination in degrees.
    /// * `observer_position`: inertial sensor position in **km**.
    pub fn new(timestamp: Epoch, ra: Degree, dec: Degree, observer_position: Vector3<f64>) -> Self {
        Observation {
            timestamp,
            ra: ra.rem_euclid(360.0),
            dec,
            observer_position,
            range: None,
        }
    }

    /// Same as [`Observation::new`] with the observer position given in **meters**.
    pub fn from_observer_meters(
        timestamp: Epoch,
        ra: Degree,
        dec: Degree,
        observer_position_m: Vector3<f64>,
    ) -> Self {
        Observation::new(timestamp, ra, dec, observer_position_m / 1000.0)
    }

    /// Observation taken by a [`GroundStation`], whose inertial position is evaluated at `timestamp`.
    pub fn from_station(timestamp: Epoch, ra: Degree, dec: Degree, station: &GroundStation) -> Self {
        Observation::new(timestamp, ra, dec, station.eci_position(timestamp))
    }

    /// Build an observation from a (not necessarily unit) line-of-sight vector.
    ///
    /// Errors
    /// ----------
    /// * [`TleFitError::DegenerateVector`] when `line_of_sight` has zero length.
    pub fn from_line_of_sight(
        timestamp: Epoch,
        line_of_sight: &Vector3<f64>,
        observer_position: Vector3<f64>,
    ) -> Result<Self, TleFitError> {
        let (ra, dec) = xyz_to_radec(line_of_sight)?;
        Ok(Observation::new(timestamp, ra, dec, observer_position))
    }

    /// Attach a slant range (km).
    pub fn with_range(mut self, range: Kilometer) -> Self {
        self.range = Some(range);
        self
    }

    /// Unit vector from the observer toward the satellite.
    pub fn line_of_sight(&self) -> Vector3<f64> {
        ra_dec_to_eci(self.ra, self.dec, 1.0)
    }

    /// Satellite position (km) when the range is known.
    pub fn target_position(&self) -> Option<Vector3<f64>> {
        self.range
            .map(|rho| self.observer_position + rho * self.line_of_sight())
    }
}

/// Check that the batch is strictly increasing in time.
///
/// Errors
/// ----------
/// * [`IodFailureKind::NotChronological`] on any equal or decreasing pair.
pub fn check_chronological(observations: &[Observation]) -> Result<(), TleFitError> {
    if observations
        .windows(2)
        .all(|w| w[0].timestamp < w[1].timestamp)
    {
        Ok(())
    } else {
        Err(IodFailureKind::NotChronological.into())
    }
}

/// Check the batch holds at least `expected` observations in chronological order.
pub(crate) fn check_batch(observations: &[Observation], expected: usize) -> Result<(), TleFitError> {
    if observations.len() < expected {
        return Err(IodFailureKind::NotEnoughObservations {
            expected,
            got: observations.len(),
        }
        .into());
    }
    check_chronological(observations)
}
