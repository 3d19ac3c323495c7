//! # Line-of-sight extraction
//!
//! Reduction of raw sensor products into [`Observation`]s.
//!
//! ## Image frames
//!
//! [`FrameExtractor`] runs the per-frame chain:
//!
//! 1. [`centroid::detect_streak`] finds the streak,
//! 2. [`edge_timing::edge_timestamp_offset`] picks the pixel to measure and its time
//!    within the exposure,
//! 3. [`plate::PlateSolution::pixel_to_radec`] turns the pixel into a direction,
//! 4. the station supplies the observer position at that instant.
//!
//! Frames without a detection are skipped by [`FrameExtractor::extract_batch`].
//!
//! ## Radar
//!
//! [`radar::RadarRecord`] converts azimuth/elevation/range records to full states.

use log::{debug, warn};

use crate::observations::Observation;
use crate::observers::GroundStation;
use crate::time::add_seconds;
use crate::tlefit_errors::TleFitError;

pub mod centroid;
pub mod edge_timing;
pub mod plate;
pub mod radar;

use centroid::{detect_streak, CentroidParams, Frame, FrameDetection};
use edge_timing::{edge_timestamp_offset, ApparentMotion};
use plate::PlateSolution;

/// Frame-to-observation reduction for one station.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameExtractor {
    pub params: CentroidParams,
    pub station: GroundStation,
}

impl FrameExtractor {
    /// Errors
    /// ----------
    /// * [`TleFitError::InvalidExtractionParameter`] for invalid `params`.
    pub fn new(params: CentroidParams, station: GroundStation) -> Result<Self, TleFitError> {
        params.validate()?;
        Ok(FrameExtractor { params, station })
    }

    /// Observation of one frame, `None` when nothing is detected.
    pub fn extract(
        &self,
        frame: &Frame,
        plate: &PlateSolution,
        motion: ApparentMotion,
    ) -> Result<Option<Observation>, TleFitError> {
        let detection = match detect_streak(frame, &self.params)? {
            FrameDetection::Detected(d) => d,
            FrameDetection::NoDetection => return Ok(None),
        };

        let timed = edge_timestamp_offset(&detection, frame, plate, motion);
        let timestamp = add_seconds(frame.exposure_start, timed.offset);
        let (ra, dec) = plate.pixel_to_radec(timed.row, timed.col);
        debug!(
            "frame at {}: pixel ({:.1}, {:.1}) +{:.2} s → RA {ra:.5}°, Dec {dec:.5}°",
            frame.exposure_start, timed.row, timed.col, timed.offset
        );
        Ok(Some(Observation::from_station(timestamp, ra, dec, &self.station)))
    }

    /// Observations of every frame with a detection, in input order.
    ///
    /// Errors
    /// ----------
    /// * Configuration errors only; empty frames are logged and skipped.
    pub fn extract_batch(
        &self,
        frames: &[(Frame, PlateSolution)],
        motion: ApparentMotion,
    ) -> Result<Vec<Observation>, TleFitError> {
        let mut observations = Vec::with_capacity(frames.len());
        for (i, (frame, plate)) in frames.iter().enumerate() {
            match self.extract(frame, plate, motion)? {
                Some(obs) => observations.push(obs),
                None => warn!("frame {i} at {}: no detection, skipped", frame.exposure_start),
            }
        }
        Ok(observations)
    }
}
