//! Synthetic two-body pass of a circular LEO over a ground station.

use hifitime::Epoch;

use crate::constants::{MU_EARTH, RADEG};
use crate::observations::Observation;
use crate::observers::GroundStation;
use crate::orbit_type::{OrbitalElementSet, StateVector};
use crate::time::{add_seconds, parse_utc};

pub(crate) fn reference_epoch() -> Epoch {
    parse_utc("2024-06-01T02:00:00").unwrap()
}

pub(crate) fn station() -> GroundStation {
    GroundStation::new(39.9, -105.2, 1_650.0, Some("test site".into())).unwrap()
}

/// a = 6771 km, e = 0, i = 51.6°, placed a few degrees north-east of the station
/// at the reference epoch.
pub(crate) fn leo_elements() -> OrbitalElementSet {
    let t_ref = reference_epoch();
    let s = station().eci_position(t_ref);
    let ra_station = s.y.atan2(s.x);
    let dec_station = (s.z / s.norm()).asin();

    let inc = 51.6 * RADEG;
    let dec_target = dec_station + 4.0 * RADEG;
    let u = (dec_target.sin() / inc.sin()).asin();
    let raan = ra_station + 3.0 * RADEG - (inc.cos() * u.sin()).atan2(u.cos());

    OrbitalElementSet::new(t_ref, 6_771.0, 0.0, 51.6, raan / RADEG, 0.0, u / RADEG).unwrap()
}

pub(crate) fn leo_truth(epoch: Epoch) -> StateVector {
    let state = leo_elements().to_state_vector(MU_EARTH);
    state
        .propagate(crate::time::seconds_between(state.epoch, epoch), MU_EARTH)
        .unwrap()
}

/// Four observations at `-spacing, 0, spacing, 2·spacing` from the reference epoch.
pub(crate) fn leo_observations(spacing: f64) -> Vec<Observation> {
    let station = station();
    (-1..=2)
        .map(|k| {
            let t = add_seconds(reference_epoch(), k as f64 * spacing);
            let observer = station.eci_position(t);
            let los = leo_truth(t).position - observer;
            Observation::from_line_of_sight(t, &los, observer).unwrap()
        })
        .collect()
}
