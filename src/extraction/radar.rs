//! Radar records → inertial state.
//!
//! A record holds azimuth, elevation and range with their rates. The topocentric
//! position and velocity are resolved in the South-East-Zenith frame of the station,
//!
//! ```text
//! ρ_S = −ρ cos el cos az          ρ_E = ρ cos el sin az          ρ_Z = ρ sin el
//! ```
//!
//! (rates by differentiation), rotated to Earth-fixed, then to inertial with GMST. The
//! inertial velocity adds `ω⊕ × r` of the Earth-fixed position.

use hifitime::Epoch;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::constants::{Degree, Kilometer, EARTH_ROTATION_RATE, RADEG};
use crate::conversion::xyz_to_radec;
use crate::initial_orbit_determination::gibbs::velocity_from_positions;
use crate::initial_orbit_determination::IODParams;
use crate::observations::Observation;
use crate::observers::GroundStation;
use crate::orbit_type::StateVector;
use crate::ref_system::{ecef_to_inertial, sez_to_ecef};
use crate::time::{gmst_at, seconds_between};
use crate::tlefit_errors::TleFitError;

/// One radar measurement. Azimuth is measured from north through east.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadarRecord {
    pub timestamp: Epoch,
    pub azimuth_deg: Degree,
    pub elevation_deg: Degree,
    pub range_km: Kilometer,
    /// km/s
    pub range_rate_km_s: f64,
    /// deg/s
    pub azimuth_rate_deg_s: f64,
    /// deg/s
    pub elevation_rate_deg_s: f64,
}

impl RadarRecord {
    /// Record without rate information.
    pub fn position_only(
        timestamp: Epoch,
        azimuth_deg: Degree,
        elevation_deg: Degree,
        range_km: Kilometer,
    ) -> Self {
        RadarRecord {
            timestamp,
            azimuth_deg,
            elevation_deg,
            range_km,
            range_rate_km_s: 0.0,
            azimuth_rate_deg_s: 0.0,
            elevation_rate_deg_s: 0.0,
        }
    }

    fn validate(&self) -> Result<(), TleFitError> {
        let values = [
            self.azimuth_deg,
            self.elevation_deg,
            self.range_km,
            self.range_rate_km_s,
            self.azimuth_rate_deg_s,
            self.elevation_rate_deg_s,
        ];
        if values.iter().any(|v| !v.is_finite()) || self.range_km <= 0.0 {
            return Err(TleFitError::InvalidExtractionParameter(format!(
                "radar record at {} is not usable (range {} km)",
                self.timestamp, self.range_km
            )));
        }
        if self.elevation_deg.abs() > 90.0 {
            return Err(TleFitError::InvalidExtractionParameter(format!(
                "elevation {} deg",
                self.elevation_deg
            )));
        }
        Ok(())
    }

    /// Topocentric position (km) and velocity (km/s) in the SEZ frame.
    pub fn sez(&self) -> (Vector3<f64>, Vector3<f64>) {
        let (sin_az, cos_az) = (self.azimuth_deg * RADEG).sin_cos();
        let (sin_el, cos_el) = (self.elevation_deg * RADEG).sin_cos();
        let rho = self.range_km;
        let rho_dot = self.range_rate_km_s;
        let az_dot = self.azimuth_rate_deg_s * RADEG;
        let el_dot = self.elevation_rate_deg_s * RADEG;

        let position = Vector3::new(-rho * cos_el * cos_az, rho * cos_el * sin_az, rho * sin_el);
        let velocity = Vector3::new(
            -rho_dot * cos_el * cos_az + rho * sin_el * cos_az * el_dot + rho * cos_el * sin_az * az_dot,
            rho_dot * cos_el * sin_az - rho * sin_el * sin_az * el_dot + rho * cos_el * cos_az * az_dot,
            rho_dot * sin_el + rho * cos_el * el_dot,
        );
        (position, velocity)
    }

    /// Geocentric inertial state of the target.
    ///
    /// Errors
    /// ----------
    /// * [`TleFitError::InvalidExtractionParameter`] for non-finite values, a
    ///   non-positive range or an elevation outside `[-90, 90]`.
    pub fn state(&self, station: &GroundStation) -> Result<StateVector, TleFitError> {
        self.validate()?;
        let (rho_sez, rho_dot_sez) = self.sez();
        let to_ecef = sez_to_ecef(station.latitude_rad(), station.longitude_rad());
        let to_eci = ecef_to_inertial(gmst_at(self.timestamp));

        let r_ecef = station.ecef_position() + to_ecef * rho_sez;
        let v_ecef = to_ecef * rho_dot_sez;
        let omega = Vector3::new(0.0, 0.0, EARTH_ROTATION_RATE);

        Ok(StateVector::new(
            self.timestamp,
            to_eci * r_ecef,
            to_eci * (v_ecef + omega.cross(&r_ecef)),
        ))
    }

    /// Angles-only view of the record, with its range attached.
    pub fn observation(&self, station: &GroundStation) -> Result<Observation, TleFitError> {
        self.validate()?;
        let (rho_sez, _) = self.sez();
        let topocentric = ecef_to_inertial(gmst_at(self.timestamp))
            * sez_to_ecef(station.latitude_rad(), station.longitude_rad())
            * rho_sez;
        let (ra, dec) = xyz_to_radec(&topocentric)?;
        Ok(Observation::from_station(self.timestamp, ra, dec, station).with_range(self.range_km))
    }
}

/// Middle state of three position-only records, velocity from Gibbs / Herrick-Gibbs.
pub fn state_from_positions(
    records: &[RadarRecord; 3],
    station: &GroundStation,
    params: &IODParams,
) -> Result<StateVector, TleFitError> {
    let states = [
        records[0].state(station)?,
        records[1].state(station)?,
        records[2].state(station)?,
    ];
    let t0 = records[1].timestamp;
    let times = [
        seconds_between(t0, records[0].timestamp),
        0.0,
        seconds_between(t0, records[2].timestamp),
    ];
    let velocity = velocity_from_positions(
        [&states[0].position, &states[1].position, &states[2].position],
        times,
        crate::constants::MU_EARTH,
        params,
    )?;
    Ok(StateVector::new(t0, states[1].position, velocity))
}

#[cfg(test)]
mod radar_test {
    use super::*;
    use crate::initial_orbit_determination::test_scenario::{leo_truth, reference_epoch, station};
    use crate::time::add_seconds;
    use approx::assert_relative_eq;

    /// Radar record of the synthetic LEO seen from the test station.
    fn record_at(epoch: Epoch) -> RadarRecord {
        let site = station();
        let truth = leo_truth(epoch);
        let to_eci = ecef_to_inertial(gmst_at(epoch));
        let to_ecef = sez_to_ecef(site.latitude_rad(), site.longitude_rad());
        let omega = Vector3::new(0.0, 0.0, EARTH_ROTATION_RATE);

        let r_ecef = to_eci.transpose() * truth.position;
        let v_ecef = to_eci.transpose() * truth.velocity - omega.cross(&r_ecef);
        let rho = to_ecef.transpose() * (r_ecef - site.ecef_position());
        let rho_dot = to_ecef.transpose() * v_ecef;

        let range = rho.norm();
        let range_rate = rho.dot(&rho_dot) / range;
        let horizontal2 = rho.x * rho.x + rho.y * rho.y;
        let az = rho.y.atan2(-rho.x);
        let el = (rho.z / range).asin();
        let az_rate = (rho_dot.x * rho.y - rho_dot.y * rho.x) / horizontal2;
        let el_rate = (rho_dot.z - range_rate * rho.z / range) / horizontal2.sqrt();

        RadarRecord {
            timestamp: epoch,
            azimuth_deg: (az / RADEG).rem_euclid(360.0),
            elevation_deg: el / RADEG,
            range_km: range,
            range_rate_km_s: range_rate,
            azimuth_rate_deg_s: az_rate / RADEG,
            elevation_rate_deg_s: el_rate / RADEG,
        }
    }

    #[test]
    fn record_reproduces_the_state() {
        let epoch = reference_epoch();
        let record = record_at(epoch);
        assert!(record.elevation_deg > 10.0);

        let state = record.state(&station()).unwrap();
        let truth = leo_truth(epoch);
        assert_relative_eq!(state.position, truth.position, epsilon = 1e-6);
        assert_relative_eq!(state.velocity, truth.velocity, epsilon = 1e-9);
    }

    #[test]
    fn observation_points_at_the_target() {
        let epoch = reference_epoch();
        let obs = record_at(epoch).observation(&station()).unwrap();
        assert_relative_eq!(
            obs.target_position().unwrap(),
            leo_truth(epoch).position,
            epsilon = 1e-6
        );
    }

    #[test]
    fn positions_only_triplet() {
        let t0 = reference_epoch();
        let records = [-20.0, 0.0, 20.0].map(|dt| {
            let full = record_at(add_seconds(t0, dt));
            RadarRecord::position_only(full.timestamp, full.azimuth_deg, full.elevation_deg, full.range_km)
        });
        let state = state_from_positions(&records, &station(), &IODParams::default()).unwrap();
        assert_relative_eq!(state.velocity, leo_truth(t0).velocity, epsilon = 1e-4);
    }

    #[test]
    fn unusable_record() {
        let mut record = record_at(reference_epoch());
        record.range_km = -1.0;
        assert!(matches!(
            record.state(&station()),
            Err(TleFitError::InvalidExtractionParameter(_))
        ));
    }
}
