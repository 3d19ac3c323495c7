//! Plate solution of a frame: pixel ↔ RA/Dec through a gnomonic projection.
//!
//! Pixel offsets from the frame center are rotated by the field rotation, scaled from
//! arcseconds to radians, and deprojected from the tangent plane at the reference
//! direction. With a zero rotation north is toward decreasing rows and east toward
//! decreasing columns (sky seen from the inside of the sphere).

use serde::Serialize;

use crate::constants::{Degree, ARCSEC_TO_DEG, RADEG};
use crate::tlefit_errors::TleFitError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlateSolution {
    pub pixel_scale_arcsec: f64,
    /// Position angle of the frame "up" direction, degrees east of north.
    pub rotation_deg: Degree,
    pub ref_ra_deg: Degree,
    pub ref_dec_deg: Degree,
    /// Pixel `(row, col)` of the reference direction.
    pub center: (f64, f64),
}

impl PlateSolution {
    /// Plate solution referenced at the geometric center of a `width × height` frame.
    ///
    /// Errors
    /// ----------
    /// * [`TleFitError::InvalidExtractionParameter`] for a non-positive scale or a
    ///   reference declination outside `[-90, 90]`.
    pub fn new(
        pixel_scale_arcsec: f64,
        rotation_deg: Degree,
        ref_ra_deg: Degree,
        ref_dec_deg: Degree,
        width: usize,
        height: usize,
    ) -> Result<Self, TleFitError> {
        if !(pixel_scale_arcsec.is_finite() && pixel_scale_arcsec > 0.0) {
            return Err(TleFitError::InvalidExtractionParameter(format!(
                "pixel scale {pixel_scale_arcsec} arcsec/px"
            )));
        }
        if !(ref_dec_deg.abs() <= 90.0) || !ref_ra_deg.is_finite() || !rotation_deg.is_finite() {
            return Err(TleFitError::InvalidExtractionParameter(format!(
                "reference direction ({ref_ra_deg}, {ref_dec_deg}) rotated by {rotation_deg}"
            )));
        }
        Ok(PlateSolution {
            pixel_scale_arcsec,
            rotation_deg,
            ref_ra_deg,
            ref_dec_deg,
            center: (
                0.5 * (height as f64 - 1.0),
                0.5 * (width as f64 - 1.0),
            ),
        })
    }

    fn radians_per_pixel(&self) -> f64 {
        self.pixel_scale_arcsec * ARCSEC_TO_DEG * RADEG
    }

    /// Standard coordinates `(ξ, η)` in radians (east, north) of a pixel.
    fn standard_coordinates(&self, row: f64, col: f64) -> (f64, f64) {
        let u = self.center.1 - col;
        let v = self.center.0 - row;
        let (s, c) = (self.rotation_deg * RADEG).sin_cos();
        let scale = self.radians_per_pixel();
        ((u * c + v * s) * scale, (-u * s + v * c) * scale)
    }

    /// Sky direction of the fractional pixel `(row, col)`, degrees, RA in `[0, 360)`.
    pub fn pixel_to_radec(&self, row: f64, col: f64) -> (Degree, Degree) {
        let (xi, eta) = self.standard_coordinates(row, col);
        let (sin_d0, cos_d0) = (self.ref_dec_deg * RADEG).sin_cos();

        let denom = cos_d0 - eta * sin_d0;
        let ra = self.ref_ra_deg * RADEG + xi.atan2(denom);
        let dec = (sin_d0 + eta * cos_d0).atan2(xi.hypot(denom));
        ((ra / RADEG).rem_euclid(360.0), dec / RADEG)
    }

    /// Pixel `(row, col)` of a sky direction.
    ///
    /// Errors
    /// ----------
    /// * [`TleFitError::InvalidExtractionParameter`] for a direction 90° or more from
    ///   the reference, which has no tangent-plane image.
    pub fn radec_to_pixel(&self, ra_deg: Degree, dec_deg: Degree) -> Result<(f64, f64), TleFitError> {
        let (sin_d0, cos_d0) = (self.ref_dec_deg * RADEG).sin_cos();
        let (sin_d, cos_d) = (dec_deg * RADEG).sin_cos();
        let (sin_da, cos_da) = ((ra_deg - self.ref_ra_deg) * RADEG).sin_cos();

        let cos_c = sin_d0 * sin_d + cos_d0 * cos_d * cos_da;
        if cos_c <= f64::EPSILON {
            return Err(TleFitError::InvalidExtractionParameter(format!(
                "({ra_deg}, {dec_deg}) is not in front of the tangent plane"
            )));
        }
        let xi = cos_d * sin_da / cos_c;
        let eta = (cos_d0 * sin_d - sin_d0 * cos_d * cos_da) / cos_c;

        let (s, c) = (self.rotation_deg * RADEG).sin_cos();
        let scale = self.radians_per_pixel();
        let u = (xi * c - eta * s) / scale;
        let v = (xi * s + eta * c) / scale;
        Ok((self.center.0 - v, self.center.1 - u))
    }
}
