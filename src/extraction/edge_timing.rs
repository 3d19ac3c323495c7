//! Timestamp assignment for streaks cut by the frame border.
//!
//! A streak fully inside the frame is measured at its bounding-box center and stamped
//! at mid-exposure. When the streak touches the border, only one of its endpoints is
//! in the frame and the bounding-box center is not the mid-exposure position. The
//! policy here uses the in-frame endpoint instead and decides between the start and
//! the end of the exposure:
//!
//! * the frame is split by the north–south line through its center, rotated with the
//!   plate solution,
//! * an endpoint on the side the satellite moves toward is the end of the exposure,
//!   one on the side it comes from is the start.
//!
//! This is a heuristic: it assumes the streak crosses the dividing line and that the
//! apparent motion is mostly east–west. Nothing guarantees the right choice for
//! streaks that enter and leave on the same side of the frame.

use crate::constants::{Seconds, RADEG};
use crate::extraction::centroid::{Detection, Frame};
use crate::extraction::plate::PlateSolution;

/// Sense of the apparent east–west motion of the satellite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApparentMotion {
    Eastward,
    Westward,
}

impl ApparentMotion {
    /// From the sign of the right-ascension rate (any unit); zero counts as eastward.
    pub fn from_ra_rate(ra_rate: f64) -> Self {
        if ra_rate < 0.0 {
            ApparentMotion::Westward
        } else {
            ApparentMotion::Eastward
        }
    }
}

/// Half of the frame relative to the rotated north–south dividing line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSide {
    East,
    West,
}

/// Pixel measured in a frame and its time offset from the exposure start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedPixel {
    pub row: f64,
    pub col: f64,
    pub offset: Seconds,
}

/// Side of the dividing line on which pixel `(row, col)` lies.
pub fn frame_side(plate: &PlateSolution, row: f64, col: f64) -> FrameSide {
    let u = plate.center.1 - col;
    let v = plate.center.0 - row;
    let (s, c) = (plate.rotation_deg * RADEG).sin_cos();
    if u * c + v * s >= 0.0 {
        FrameSide::East
    } else {
        FrameSide::West
    }
}

/// In-frame endpoint of a border-cut streak: the blob pixel farthest from the mean of
/// its border pixels. `None` when the blob does not touch the border.
pub fn in_frame_endpoint(detection: &Detection, frame: &Frame) -> Option<(usize, usize)> {
    let (w, h) = (frame.width(), frame.height());
    let on_border = |&&(r, c): &&(usize, usize)| r == 0 || c == 0 || r + 1 == h || c + 1 == w;

    let contacts: Vec<&(usize, usize)> = detection.blob.pixels.iter().filter(on_border).collect();
    if contacts.is_empty() {
        return None;
    }
    let n = contacts.len() as f64;
    let contact_row = contacts.iter().map(|p| p.0 as f64).sum::<f64>() / n;
    let contact_col = contacts.iter().map(|p| p.1 as f64).sum::<f64>() / n;

    detection
        .blob
        .pixels
        .iter()
        .copied()
        .max_by(|a, b| {
            let da = (a.0 as f64 - contact_row).hypot(a.1 as f64 - contact_col);
            let db = (b.0 as f64 - contact_row).hypot(b.1 as f64 - contact_col);
            da.total_cmp(&db)
        })
}

/// Pixel to measure and its time offset from the exposure start.
///
/// Non-edge detections give the centroid at half the exposure. Edge detections give
/// the in-frame endpoint at `0` (start) or `frame.exposure_duration` (end).
pub fn edge_timestamp_offset(
    detection: &Detection,
    frame: &Frame,
    plate: &PlateSolution,
    motion: ApparentMotion,
) -> TimedPixel {
    let Some((row, col)) = in_frame_endpoint(detection, frame) else {
        return TimedPixel {
            row: detection.centroid.0,
            col: detection.centroid.1,
            offset: 0.5 * frame.exposure_duration,
        };
    };
    let (row, col) = (row as f64, col as f64);

    let leading_side = match motion {
        ApparentMotion::Eastward => FrameSide::East,
        ApparentMotion::Westward => FrameSide::West,
    };
    let offset = if frame_side(plate, row, col) == leading_side {
        frame.exposure_duration
    } else {
        0.0
    };
    TimedPixel { row, col, offset }
}

#[cfg(test)]
mod edge_timing_test {
    use super::*;
    use crate::extraction::centroid::centroid_test::synthetic_frame;
    use crate::extraction::centroid::{detect_streak, CentroidParams};

    fn horizontal(row: usize, cols: std::ops::Range<usize>) -> Vec<(usize, usize)> {
        cols.map(|c| (row, c)).collect()
    }

    // seeds must cover the whole streak for it to reach the border
    fn long_streak_params() -> CentroidParams {
        CentroidParams {
            top_k: 100,
            ..CentroidParams::default()
        }
    }

    fn plate(rotation_deg: f64) -> PlateSolution {
        PlateSolution::new(2.0, rotation_deg, 0.0, 0.0, 64, 48).unwrap()
    }

    #[test]
    fn side_of_dividing_line() {
        let p = plate(0.0);
        // east is toward decreasing columns without rotation
        assert_eq!(frame_side(&p, 10.0, 5.0), FrameSide::East);
        assert_eq!(frame_side(&p, 10.0, 60.0), FrameSide::West);
        // a half turn swaps the halves
        let flipped = plate(180.0);
        assert_eq!(frame_side(&flipped, 10.0, 5.0), FrameSide::West);
    }

    #[test]
    fn heuristic_interior_streak_uses_mid_exposure() {
        let frame = synthetic_frame(64, 48, &horizontal(20, 20..32), 200.0);
        let d = detect_streak(&frame, &CentroidParams::default()).unwrap();
        let d = d.detection().unwrap();
        let timed = edge_timestamp_offset(d, &frame, &plate(0.0), ApparentMotion::Eastward);
        assert_eq!(timed.offset, 0.5);
        assert_eq!((timed.row, timed.col), (20.0, 25.5));
    }

    #[test]
    fn heuristic_endpoint_on_leading_side_is_exposure_end() {
        // enters from the west (right) border and stops in the east half
        let frame = synthetic_frame(64, 48, &horizontal(20, 14..64), 200.0);
        let d = detect_streak(&frame, &long_streak_params()).unwrap();
        let d = d.detection().unwrap();
        assert_eq!(in_frame_endpoint(d, &frame), Some((20, 14)));

        let east = edge_timestamp_offset(d, &frame, &plate(0.0), ApparentMotion::Eastward);
        assert_eq!(east.offset, 1.0);
        assert_eq!((east.row, east.col), (20.0, 14.0));

        let west = edge_timestamp_offset(d, &frame, &plate(0.0), ApparentMotion::Westward);
        assert_eq!(west.offset, 0.0);
    }

    #[test]
    fn heuristic_rotation_flips_the_decision() {
        let frame = synthetic_frame(64, 48, &horizontal(20, 14..64), 200.0);
        let d = detect_streak(&frame, &long_streak_params()).unwrap();
        let d = d.detection().unwrap();
        let timed = edge_timestamp_offset(d, &frame, &plate(180.0), ApparentMotion::Eastward);
        assert_eq!(timed.offset, 0.0);
    }

    #[test]
    fn motion_from_ra_rate() {
        assert_eq!(ApparentMotion::from_ra_rate(0.2), ApparentMotion::Eastward);
        assert_eq!(ApparentMotion::from_ra_rate(-1e-3), ApparentMotion::Westward);
    }
}
