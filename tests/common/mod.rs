#![allow(dead_code)]

use approx::assert_relative_eq;
use hifitime::Epoch;
use tlefit::constants::{MU_EARTH, RADEG};
use tlefit::conversion::wrap_deg_180;
use tlefit::observations::Observation;
use tlefit::observers::GroundStation;
use tlefit::orbit_type::{OrbitalElementSet, StateVector};
use tlefit::time::{add_seconds, gmst_at, parse_utc, seconds_between};
use tlefit::tle::propagator::Sgp4Propagator;
use tlefit::tle::{TleHeader, TleRecord};

/// ISS (ZARYA) as distributed in the SGP4 verification material.
pub const ISS_LINE1: &str = "1 25544U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2927";
pub const ISS_LINE2: &str = "2 25544  51.6416 247.4627 0006703 130.5360 325.0288 15.72125391563537";

pub fn iss_epoch() -> Epoch {
    parse_utc("2008-09-20T12:25:40.104192").unwrap()
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn reference_epoch() -> Epoch {
    parse_utc("2024-06-01T02:00:00").unwrap()
}

/// Two-body orbit observed from one ground station.
pub struct Scenario {
    pub station: GroundStation,
    pub elements: OrbitalElementSet,
}

impl Scenario {
    /// Orbit whose argument of latitude puts the satellite `north_deg` north and
    /// `east_deg` east of the station direction at the reference epoch.
    fn over_station(
        station: GroundStation,
        a_km: f64,
        e: f64,
        inc_deg: f64,
        argp_deg: f64,
        north_deg: f64,
        east_deg: f64,
    ) -> Self {
        let t_ref = reference_epoch();
        let s = station.eci_position(t_ref);
        let ra_station = s.y.atan2(s.x);
        let dec_station = (s.z / s.norm()).asin();

        let inc = inc_deg * RADEG;
        let u = ((dec_station + north_deg * RADEG).sin() / inc.sin()).asin();
        let raan = ra_station + east_deg * RADEG - (inc.cos() * u.sin()).atan2(u.cos());

        let elements = OrbitalElementSet::new(
            t_ref,
            a_km,
            e,
            inc_deg,
            raan / RADEG,
            argp_deg,
            u / RADEG - argp_deg,
        )
        .unwrap();
        Scenario { station, elements }
    }

    pub fn leo() -> Self {
        let station = GroundStation::new(39.9, -105.2, 1_650.0, Some("Table Mountain".into())).unwrap();
        Self::over_station(station, 6_771.0, 0.0, 51.6, 0.0, 4.0, 3.0)
    }

    pub fn eccentric() -> Self {
        let station = GroundStation::new(55.8, 12.5, 40.0, Some("Lyngby".into())).unwrap();
        Self::over_station(station, 7_200.0, 0.03, 72.0, 40.0, 3.0, -2.0)
    }

    pub fn truth(&self, epoch: Epoch) -> StateVector {
        let state = self.elements.to_state_vector(MU_EARTH);
        state
            .propagate(seconds_between(state.epoch, epoch), MU_EARTH)
            .unwrap()
    }

    /// Exact angles-only observations at the given offsets from the reference epoch.
    pub fn observations(&self, offsets_s: &[f64]) -> Vec<Observation> {
        offsets_s
            .iter()
            .map(|dt| {
                let t = add_seconds(reference_epoch(), *dt);
                let observer = self.station.eci_position(t);
                Observation::from_line_of_sight(t, &(self.truth(t).position - observer), observer)
                    .unwrap()
            })
            .collect()
    }
}

/// The scenario elements rendered directly as a TLE, and observations of that TLE
/// propagated with SGP4 from the scenario station.
pub fn sgp4_observations(scenario: &Scenario, header: &TleHeader, offsets_s: &[f64]) -> (TleRecord, Vec<Observation>) {
    let tle = TleRecord::from_elements(&scenario.elements, header).unwrap();
    let sgp4 = Sgp4Propagator::from_record(&tle).unwrap();
    let observations = offsets_s
        .iter()
        .map(|dt| {
            let t = add_seconds(reference_epoch(), *dt);
            let (r, _) = sgp4.state_at(t).unwrap();
            let observer = scenario.station.eci_position(t);
            Observation::from_line_of_sight(t, &(r - observer), observer).unwrap()
        })
        .collect();
    (tle, observations)
}

/// Station a few degrees off the ISS ground track at the TLE epoch, and SGP4
/// observations of the ISS from it.
pub fn iss_observations(offsets_s: &[f64]) -> (GroundStation, Vec<Observation>) {
    let sgp4 = Sgp4Propagator::from_lines(ISS_LINE1, ISS_LINE2).unwrap();
    let (r0, _) = sgp4.state_at(iss_epoch()).unwrap();
    let lat = (r0.z / r0.norm()).asin() / RADEG;
    let lon = (r0.y.atan2(r0.x) - gmst_at(iss_epoch())) / RADEG;
    let station = GroundStation::new(lat - 3.0, wrap_deg_180(lon + 2.0), 100.0, None).unwrap();

    let observations = offsets_s
        .iter()
        .map(|dt| {
            let t = add_seconds(iss_epoch(), *dt);
            let (r, _) = sgp4.state_at(t).unwrap();
            let observer = station.eci_position(t);
            Observation::from_line_of_sight(t, &(r - observer), observer).unwrap()
        })
        .collect();
    (station, observations)
}

pub fn assert_elements_close(actual: &OrbitalElementSet, expected: &OrbitalElementSet, a_km: f64, angle_deg: f64) {
    assert_relative_eq!(actual.semi_major_axis_km, expected.semi_major_axis_km, epsilon = a_km);
    assert_relative_eq!(actual.inclination_deg, expected.inclination_deg, epsilon = angle_deg);
    assert!(
        wrap_deg_180(actual.raan_deg - expected.raan_deg).abs() < angle_deg,
        "raan {} vs {}",
        actual.raan_deg,
        expected.raan_deg
    );
}
