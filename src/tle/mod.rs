//! # Two-Line Element sets
//!
//! Rendering of an [`OrbitalElementSet`] into the fixed-column NORAD format:
//!
//! ```text
//! 1 NNNNNC IIIIIIII YYDDD.DDDDDDDD ±.NNNNNNNN ±NNNNN±N ±NNNNN±N T EEEEK
//! 2 NNNNN III.IIII RRR.RRRR EEEEEEE PPP.PPPP MMM.MMMM NN.NNNNNNNNRRRRRK
//! ```
//!
//! Each line is 69 characters; the last one is a checksum over columns 1–68 (digits
//! count for their value, `-` counts for one). Fields that are not determined by
//! the orbit (catalog number, designator, drag terms, counters) come from a
//! [`TleHeader`].
//!
//! Submodules
//! -----------------
//! * [`propagator`]: SGP4 bridge built from the rendered text.
//! * [`fit`]: adjustment of the mean elements so that SGP4 reproduces a state.

use hifitime::Epoch;
use serde::Serialize;
use std::fmt;

use crate::constants::MU_EARTH;
use crate::orbit_type::OrbitalElementSet;
use crate::time::tle_epoch_field;
use crate::tlefit_errors::TleFitError;

pub mod fit;
pub mod propagator;

/// Mean motion at or above this value does not fit the `NN.NNNNNNNN` field.
pub const MAX_MEAN_MOTION_REV_PER_DAY: f64 = 100.0;

/// Security classification of column 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Classification {
    #[default]
    Unclassified,
    Classified,
    Secret,
}

impl Classification {
    pub fn as_char(&self) -> char {
        match self {
            Classification::Unclassified => 'U',
            Classification::Classified => 'C',
            Classification::Secret => 'S',
        }
    }
}

/// TLE fields that the orbit does not determine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TleHeader {
    pub norad_id: u32,
    pub classification: Classification,
    pub international_designator: String,
    pub element_set_number: u32,
    pub revolution_number: u32,
    /// First derivative of the mean motion divided by two, rev/day².
    pub mean_motion_dot: f64,
    /// Second derivative of the mean motion divided by six, rev/day³.
    pub mean_motion_ddot: f64,
    /// Drag term, inverse Earth radii.
    pub bstar: f64,
}

impl Default for TleHeader {
    fn default() -> Self {
        TleHeader {
            norad_id: 99_999,
            classification: Classification::Unclassified,
            international_designator: String::new(),
            element_set_number: 999,
            revolution_number: 0,
            mean_motion_dot: 0.0,
            mean_motion_ddot: 0.0,
            bstar: 0.0,
        }
    }
}

impl TleHeader {
    pub fn new(norad_id: u32) -> Self {
        TleHeader {
            norad_id,
            ..Default::default()
        }
    }

    pub fn with_classification(mut self, classification: Classification) -> Self {
        self.classification = classification;
        self
    }

    pub fn with_international_designator(mut self, designator: impl Into<String>) -> Self {
        self.international_designator = designator.into();
        self
    }

    pub fn with_element_set_number(mut self, number: u32) -> Self {
        self.element_set_number = number;
        self
    }

    pub fn with_revolution_number(mut self, number: u32) -> Self {
        self.revolution_number = number;
        self
    }

    pub fn with_drag(mut self, mean_motion_dot: f64, mean_motion_ddot: f64, bstar: f64) -> Self {
        self.mean_motion_dot = mean_motion_dot;
        self.mean_motion_ddot = mean_motion_ddot;
        self.bstar = bstar;
        self
    }

    fn validate(&self) -> Result<(), TleFitError> {
        if self.norad_id > 99_999 {
            return Err(format_error(format!(
                "NORAD id {} exceeds 5 digits",
                self.norad_id
            )));
        }
        if !self.international_designator.is_ascii() || self.international_designator.len() > 8 {
            return Err(format_error(format!(
                "international designator '{}' must be at most 8 ASCII characters",
                self.international_designator
            )));
        }
        if self.element_set_number > 9_999 {
            return Err(format_error("element set number exceeds 4 digits"));
        }
        if self.revolution_number > 99_999 {
            return Err(format_error("revolution number exceeds 5 digits"));
        }
        Ok(())
    }
}

fn format_error(reason: impl Into<String>) -> TleFitError {
    TleFitError::FormatError(reason.into())
}

/// Checksum of a TLE line: digits plus one per `-`, over the first 68 columns, mod 10.
pub fn checksum(line: &str) -> u32 {
    line.chars()
        .take(68)
        .map(|c| match c {
            '0'..='9' => c as u32 - '0' as u32,
            '-' => 1,
            _ => 0,
        })
        .sum::<u32>()
        % 10
}

/// `true` for a 69-column line whose last column matches [`checksum`].
pub fn verify_line(line: &str) -> bool {
    let line = line.trim_end();
    line.len() == 69
        && line.is_ascii()
        && line[68..]
            .chars()
            .next()
            .and_then(|c| c.to_digit(10))
            .is_some_and(|d| d == checksum(line))
}

fn with_checksum(mut body: String) -> String {
    let sum = checksum(&body);
    body.push(char::from_digit(sum, 10).unwrap_or('0'));
    body
}

/// Angle rounded to 4 decimals, 360.0000 folded to 0.0000.
fn round_angle(angle: f64) -> f64 {
    let rounded = (angle * 1e4).round() / 1e4;
    if rounded >= 360.0 {
        rounded - 360.0
    } else {
        rounded
    }
}

/// `±.NNNNNNNN` (10 columns).
fn format_decimal_field(value: f64) -> Result<String, TleFitError> {
    let digits = format!("{:.8}", value.abs());
    match digits.strip_prefix('0') {
        Some(fraction) if value.is_finite() => {
            let sign = if value < 0.0 && digits != "0.00000000" {
                '-'
            } else {
                ' '
            };
            Ok(format!("{sign}{fraction}"))
        }
        _ => Err(format_error(format!(
            "mean motion derivative {value} out of range"
        ))),
    }
}

/// `±NNNNN±N` (8 columns): `±0.NNNNN × 10^±N`.
fn format_exponent_field(value: f64) -> Result<String, TleFitError> {
    if !value.is_finite() {
        return Err(format_error(format!("non-finite field value {value}")));
    }
    if value == 0.0 {
        return Ok(" 00000-0".to_string());
    }

    let magnitude = value.abs();
    let mut exponent = magnitude.log10().floor() as i32 + 1;
    let mut mantissa = (magnitude / 10f64.powi(exponent) * 1e5).round() as u32;
    if mantissa >= 100_000 {
        mantissa /= 10;
        exponent += 1;
    }
    if mantissa == 0 {
        return Ok(" 00000-0".to_string());
    }
    if !(-9..=9).contains(&exponent) {
        return Err(format_error(format!(
            "value {value} does not fit an exponent field"
        )));
    }

    let sign = if value < 0.0 { '-' } else { ' ' };
    let exp_sign = if exponent < 0 { '-' } else { '+' };
    Ok(format!(
        "{sign}{mantissa:05}{exp_sign}{}",
        exponent.unsigned_abs()
    ))
}

/// A rendered-ready TLE, immutable after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TleRecord {
    header: TleHeader,
    epoch: Epoch,
    epoch_year: u32,
    epoch_day: f64,
    mean_motion_rev_per_day: f64,
    inclination_deg: f64,
    raan_deg: f64,
    eccentricity: f64,
    arg_perigee_deg: f64,
    mean_anomaly_deg: f64,
    line1: String,
    line2: String,
}

impl TleRecord {
    /// Build a TLE from an element set and a header.
    ///
    /// The mean anomaly is obtained through the eccentric anomaly and the mean
    /// motion from `n = sqrt(µ/a³)`.
    ///
    /// Errors
    /// ----------
    /// * [`TleFitError::FormatError`] for a non-finite element, `e ∉ [0, 1)`, `a ≤ 0`,
    ///   a mean motion of 100 rev/day or more, or an invalid header.
    pub fn from_elements(
        elements: &OrbitalElementSet,
        header: &TleHeader,
    ) -> Result<TleRecord, TleFitError> {
        header.validate()?;

        let values = [
            elements.semi_major_axis_km,
            elements.eccentricity,
            elements.inclination_deg,
            elements.raan_deg,
            elements.arg_perigee_deg,
            elements.true_anomaly_deg,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(format_error("non-finite orbital element"));
        }
        if !(0.0..1.0).contains(&elements.eccentricity) {
            return Err(format_error(format!(
                "eccentricity {} outside [0, 1)",
                elements.eccentricity
            )));
        }
        if elements.semi_major_axis_km <= 0.0 {
            return Err(format_error("non-positive semi-major axis"));
        }

        let mean_motion = elements.mean_motion_rev_per_day(MU_EARTH);
        if mean_motion >= MAX_MEAN_MOTION_REV_PER_DAY {
            return Err(format_error(format!(
                "mean motion {mean_motion:.4} rev/day cannot be rendered"
            )));
        }

        let (epoch_year, epoch_day) = tle_epoch_field(elements.epoch);
        let mut record = TleRecord {
            header: header.clone(),
            epoch: elements.epoch,
            epoch_year,
            epoch_day,
            mean_motion_rev_per_day: mean_motion,
            inclination_deg: elements.inclination_deg,
            raan_deg: elements.raan_deg,
            eccentricity: elements.eccentricity,
            arg_perigee_deg: elements.arg_perigee_deg,
            mean_anomaly_deg: elements.mean_anomaly_deg(),
            line1: String::new(),
            line2: String::new(),
        };
        record.line1 = record.render_line1()?;
        record.line2 = record.render_line2()?;
        Ok(record)
    }

    fn render_line1(&self) -> Result<String, TleFitError> {
        let h = &self.header;
        let body = format!(
            "1 {:05}{} {:<8} {:02}{:012.8} {} {} {} 0 {:>4}",
            h.norad_id,
            h.classification.as_char(),
            h.international_designator,
            self.epoch_year,
            self.epoch_day,
            format_decimal_field(h.mean_motion_dot)?,
            format_exponent_field(h.mean_motion_ddot)?,
            format_exponent_field(h.bstar)?,
            h.element_set_number,
        );
        Ok(with_checksum(body))
    }

    fn render_line2(&self) -> Result<String, TleFitError> {
        let eccentricity = (self.eccentricity * 1e7).round() as u64;
        if eccentricity >= 10_000_000 {
            return Err(format_error("eccentricity rounds to 1"));
        }
        let body = format!(
            "2 {:05} {:8.4} {:8.4} {:07} {:8.4} {:8.4} {:11.8}{:05}",
            self.header.norad_id,
            round_angle(self.inclination_deg),
            round_angle(self.raan_deg),
            eccentricity,
            round_angle(self.arg_perigee_deg),
            round_angle(self.mean_anomaly_deg),
            self.mean_motion_rev_per_day,
            self.header.revolution_number,
        );
        Ok(with_checksum(body))
    }

    /// First line, 69 columns.
    pub fn line1(&self) -> &str {
        &self.line1
    }

    /// Second line, 69 columns.
    pub fn line2(&self) -> &str {
        &self.line2
    }

    pub fn header(&self) -> &TleHeader {
        &self.header
    }

    pub fn norad_id(&self) -> u32 {
        self.header.norad_id
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn epoch_year(&self) -> u32 {
        self.epoch_year
    }

    pub fn epoch_day(&self) -> f64 {
        self.epoch_day
    }

    pub fn mean_motion_rev_per_day(&self) -> f64 {
        self.mean_motion_rev_per_day
    }

    pub fn inclination_deg(&self) -> f64 {
        self.inclination_deg
    }

    pub fn raan_deg(&self) -> f64 {
        self.raan_deg
    }

    pub fn eccentricity(&self) -> f64 {
        self.eccentricity
    }

    pub fn arg_perigee_deg(&self) -> f64 {
        self.arg_perigee_deg
    }

    pub fn mean_anomaly_deg(&self) -> f64 {
        self.mean_anomaly_deg
    }
}

impl fmt::Display for TleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.line1())?;
        write!(f, "{}", self.line2())
    }
}
