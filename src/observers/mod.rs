//! # Observer & site geometry
//!
//! A [`GroundStation`] stores a geodetic site (WGS84), its precomputed **Earth-fixed**
//! position and velocity, and produces the inertial position of the sensor at any epoch.
//!
//! ## Frames & conventions
//!
//! ```text
//! Earth-fixed  --(GMST IAU 1982 rotation about z)-->  inertial (TEME-aligned)
//! ```
//!
//! The same sidereal model is used by the residual evaluator, so observations ingested
//! through this module and SGP4 predictions share one frame.
//!
//! ## Units
//!
//! - Latitude/longitude: **degrees** (east positive).
//! - Elevation: **meters** at the API boundary, km internally.
//! - Positions: **km**; velocities: **km/s**.

use hifitime::Epoch;
use nalgebra::Vector3;
use ordered_float::NotNan;

use crate::constants::{Degree, Meter, EARTH_ROTATION_RATE};
use crate::ref_system::ecef_to_inertial;
use crate::time::gmst_at;
use crate::tlefit_errors::TleFitError;

pub mod observer_position;

pub use observer_position::{geodetic_to_ecef, geodetic_to_eci};

/// A fixed sensor on the Earth's surface.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundStation {
    /// Geodetic latitude in **degrees**.
    pub latitude: NotNan<f64>,

    /// Longitude in **degrees** east of Greenwich.
    pub longitude: NotNan<f64>,

    /// Height above the WGS84 ellipsoid in **meters**.
    pub elevation: NotNan<f64>,

    /// Optional human-readable site name.
    pub name: Option<String>,

    /// Precomputed Earth-fixed position in **km**.
    fixed_position: Vector3<f64>,
}

impl GroundStation {
    /// Create a station from geodetic coordinates.
    ///
    /// Arguments
    /// -----------------
    /// * `latitude`: geodetic latitude in **degrees**, within `[-90, 90]`.
    /// * `longitude`: longitude in **degrees** (east positive).
    /// * `elevation`: height above the ellipsoid in **meters**.
    /// * `name`: optional site name.
    ///
    /// Errors
    /// ----------
    /// * [`TleFitError::InvalidFloatValue`] if an input is NaN.
    /// * [`TleFitError::InvalidExtractionParameter`] if the latitude is out of range.
    pub fn new(
        latitude: Degree,
        longitude: Degree,
        elevation: Meter,
        name: Option<String>,
    ) -> Result<GroundStation, TleFitError> {
        let latitude = NotNan::new(latitude)?;
        let longitude = NotNan::new(longitude)?;
        let elevation = NotNan::new(elevation)?;
        if latitude.abs() > 90.0 {
            return Err(TleFitError::InvalidExtractionParameter(format!(
                "latitude {latitude} is outside [-90, 90]"
            )));
        }

        let fixed_position =
            geodetic_to_ecef(latitude.into_inner(), longitude.into_inner(), elevation.into_inner());

        Ok(GroundStation {
            latitude,
            longitude,
            elevation,
            name,
            fixed_position,
        })
    }

    /// Earth-fixed position in **km**.
    pub fn ecef_position(&self) -> Vector3<f64> {
        self.fixed_position
    }

    /// Inertial position in **km** at `epoch`.
    pub fn eci_position(&self, epoch: Epoch) -> Vector3<f64> {
        ecef_to_inertial(gmst_at(epoch)) * self.fixed_position
    }

    /// Inertial velocity in **km/s** at `epoch` (`ω⊕ × r`).
    pub fn eci_velocity(&self, epoch: Epoch) -> Vector3<f64> {
        let omega = Vector3::new(0.0, 0.0, EARTH_ROTATION_RATE);
        omega.cross(&self.eci_position(epoch))
    }

    /// Latitude in radians.
    pub(crate) fn latitude_rad(&self) -> f64 {
        self.latitude.into_inner().to_radians()
    }

    /// Longitude in radians.
    pub(crate) fn longitude_rad(&self) -> f64 {
        self.longitude.into_inner().to_radians()
    }
}
