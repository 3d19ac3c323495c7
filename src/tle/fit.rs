//! Mean-element fitting for SGP4.
//!
//! An osculating two-body state rendered directly as a TLE is not what SGP4 expects:
//! SGP4 interprets the fields as Brouwer mean elements and adds J2 short-period terms,
//! which moves the epoch position by several kilometres in LEO. [`fit_mean_elements`]
//! runs the fixed-point iteration
//!
//! ```text
//! s_{k+1} = s_k + (target − SGP4(TLE(s_k), t = 0))
//! ```
//!
//! on the state, until SGP4 at epoch reproduces the target position to 1 m or the
//! iteration cap is reached. The best TLE seen is returned either way; the 4-decimal
//! angle fields limit the attainable agreement to roughly ten metres in LEO.

use log::debug;

use crate::constants::MU_EARTH;
use crate::orbit_type::{OrbitalElementSet, StateVector};
use crate::tle::propagator::Sgp4Propagator;
use crate::tle::{TleHeader, TleRecord};
use crate::tlefit_errors::TleFitError;

const MAX_ITER: usize = 20;
const POSITION_TOLERANCE_KM: f64 = 1e-3;

/// Best TLE found by [`fit_mean_elements`].
#[derive(Debug, Clone, PartialEq)]
pub struct MeanElementFit {
    pub record: TleRecord,
    /// Element set rendered into `record`.
    pub mean_elements: OrbitalElementSet,
    /// Distance between SGP4 at epoch and the target position, km.
    pub position_error_km: f64,
    pub iterations: usize,
}

fn evaluate(
    trial: &StateVector,
    header: &TleHeader,
) -> Result<(TleRecord, OrbitalElementSet, StateVector), TleFitError> {
    let elements = OrbitalElementSet::from_state_vector(trial, MU_EARTH)?;
    let record = TleRecord::from_elements(&elements, header)?;
    let (position, velocity) = Sgp4Propagator::from_record(&record)?
        .state_at_minutes(0.0)
        .map_err(|reason| TleFitError::PropagationFailure {
            epoch: trial.epoch,
            reason,
        })?;
    Ok((record, elements, StateVector::new(trial.epoch, position, velocity)))
}

/// Find the TLE whose SGP4 state at epoch matches `target`.
///
/// Errors
/// ----------
/// * Errors of the first evaluation (the target state itself cannot be rendered or
///   propagated). Later failures stop the iteration and the best TLE is returned.
pub fn fit_mean_elements(
    target: &StateVector,
    header: &TleHeader,
) -> Result<MeanElementFit, TleFitError> {
    let mut trial = *target;
    let mut best: Option<MeanElementFit> = None;

    for iteration in 1..=MAX_ITER {
        let (record, mean_elements, predicted) = match evaluate(&trial, header) {
            Ok(v) => v,
            Err(e) if best.is_some() => {
                debug!("mean-element fit stopped at iteration {iteration}: {e}");
                break;
            }
            Err(e) => return Err(e),
        };

        let dr = target.position - predicted.position;
        let dv = target.velocity - predicted.velocity;
        let error = dr.norm();
        debug!("mean-element fit iteration {iteration}: |Δr| = {error:.6} km");

        if best.as_ref().map_or(true, |b| error < b.position_error_km) {
            best = Some(MeanElementFit {
                record,
                mean_elements,
                position_error_km: error,
                iterations: iteration,
            });
        }
        if error < POSITION_TOLERANCE_KM {
            break;
        }

        trial.position += dr;
        trial.velocity += dv;
    }

    best.ok_or(TleFitError::FormatError("mean-element fit produced no TLE".into()))
}
