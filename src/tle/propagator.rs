//! SGP4 propagation of a rendered TLE.
//!
//! The propagator is always built from the TLE *text*, so what is propagated is
//! exactly what a downstream consumer of the lines would get (rounded fields
//! included).

use hifitime::Epoch;
use nalgebra::Vector3;

use crate::time::to_naive_utc;
use crate::tle::{verify_line, TleRecord};
use crate::tlefit_errors::TleFitError;

/// SGP4 elements and constants of one TLE.
pub struct Sgp4Propagator {
    elements: sgp4::Elements,
    constants: sgp4::Constants,
}

impl Sgp4Propagator {
    /// Parse two TLE lines.
    ///
    /// Errors
    /// ----------
    /// * [`TleFitError::InvalidTle`] for a bad checksum or if `sgp4` rejects the text.
    pub fn from_lines(line1: &str, line2: &str) -> Result<Self, TleFitError> {
        if !(verify_line(line1) && verify_line(line2)) {
            return Err(TleFitError::InvalidTle("checksum mismatch or wrong length".into()));
        }
        let elements = sgp4::Elements::from_tle(None, line1.as_bytes(), line2.as_bytes())
            .map_err(|e| TleFitError::InvalidTle(format!("{e:?}")))?;
        let constants = sgp4::Constants::from_elements(&elements)
            .map_err(|e| TleFitError::InvalidTle(format!("{e:?}")))?;
        Ok(Sgp4Propagator {
            elements,
            constants,
        })
    }

    pub fn from_record(record: &TleRecord) -> Result<Self, TleFitError> {
        Self::from_lines(&record.line1(), &record.line2())
    }

    /// TEME state (km, km/s) `minutes` after the TLE epoch.
    pub fn state_at_minutes(
        &self,
        minutes: f64,
    ) -> Result<(Vector3<f64>, Vector3<f64>), String> {
        let prediction = self
            .constants
            .propagate(sgp4::MinutesSinceEpoch(minutes))
            .map_err(|e| format!("{e:?}"))?;
        Ok((
            Vector3::from(prediction.position),
            Vector3::from(prediction.velocity),
        ))
    }

    /// TEME state (km, km/s) at `epoch`.
    ///
    /// Errors
    /// ----------
    /// * [`TleFitError::PropagationFailure`] when SGP4 fails (decayed orbit, diverging
    ///   eccentricity) or the epoch is not representable.
    pub fn state_at(&self, epoch: Epoch) -> Result<(Vector3<f64>, Vector3<f64>), TleFitError> {
        let failure = |reason: String| TleFitError::PropagationFailure { epoch, reason };
        let datetime = to_naive_utc(epoch).map_err(|e| failure(e.to_string()))?;
        let minutes = self
            .elements
            .datetime_to_minutes_since_epoch(&datetime)
            .map_err(|e| failure(format!("{e:?}")))?;
        self.state_at_minutes(minutes.0).map_err(failure)
    }
}
