//! # Residuals of a TLE against observations
//!
//! The TLE text is turned into an SGP4 propagator; every observation is compared with
//! the topocentric direction predicted at its timestamp:
//!
//! ```text
//! ΔRA  = wrap(RA_pred − RA_obs) ∈ [−180, 180)
//! ΔDec = Dec_pred − Dec_obs
//! ```
//!
//! Samples whose propagation fails are logged and skipped; the batch continues.

use hifitime::Epoch;
use log::warn;
use serde::Serialize;

use crate::conversion::{wrap_deg_180, xyz_to_radec};
use crate::observations::Observation;
use crate::tle::propagator::Sgp4Propagator;
use crate::tle::TleRecord;
use crate::tlefit_errors::TleFitError;

/// Angular residual of one observation, degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResidualSample {
    pub timestamp: Epoch,
    pub delta_ra_deg: f64,
    pub delta_dec_deg: f64,
}

impl ResidualSample {
    /// `sqrt(ΔRA² + ΔDec²)`, with ΔRA not scaled by `cos δ`.
    pub fn magnitude_deg(&self) -> f64 {
        self.delta_ra_deg.hypot(self.delta_dec_deg)
    }
}

/// Statistics over a batch of residuals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResidualSummary {
    pub count: usize,
    pub rms_ra_deg: f64,
    pub rms_dec_deg: f64,
    pub max_abs_ra_deg: f64,
    pub max_abs_dec_deg: f64,
}

impl ResidualSummary {
    /// `None` for an empty batch.
    pub fn from_samples(samples: &[ResidualSample]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;
        let rms = |f: fn(&ResidualSample) -> f64| {
            (samples.iter().map(|s| f(s).powi(2)).sum::<f64>() / n).sqrt()
        };
        let max = |f: fn(&ResidualSample) -> f64| {
            samples.iter().map(|s| f(s).abs()).fold(0.0, f64::max)
        };
        Some(ResidualSummary {
            count: samples.len(),
            rms_ra_deg: rms(|s| s.delta_ra_deg),
            rms_dec_deg: rms(|s| s.delta_dec_deg),
            max_abs_ra_deg: max(|s| s.delta_ra_deg),
            max_abs_dec_deg: max(|s| s.delta_dec_deg),
        })
    }
}

fn residual(
    propagator: &Sgp4Propagator,
    observation: &Observation,
) -> Result<ResidualSample, TleFitError> {
    let (position, _) = propagator.state_at(observation.timestamp)?;
    let (ra, dec) = xyz_to_radec(&(position - observation.observer_position))?;
    Ok(ResidualSample {
        timestamp: observation.timestamp,
        delta_ra_deg: wrap_deg_180(ra - observation.ra),
        delta_dec_deg: dec - observation.dec,
    })
}

/// Residuals of `tle` against every observation that can be propagated.
///
/// Errors
/// ----------
/// * [`TleFitError::InvalidTle`] when the TLE text cannot be parsed; no sample is
///   produced in that case.
pub fn evaluate_residuals(
    tle: &TleRecord,
    observations: &[Observation],
) -> Result<Vec<ResidualSample>, TleFitError> {
    let propagator = Sgp4Propagator::from_record(tle)?;

    let mut samples = Vec::with_capacity(observations.len());
    for observation in observations {
        match residual(&propagator, observation) {
            Ok(sample) => samples.push(sample),
            Err(e) => warn!(
                "residual at {} skipped: {e}",
                observation.timestamp
            ),
        }
    }
    Ok(samples)
}
