//! Angle string parsing/rendering and RA/Dec ↔ Cartesian conversions in degrees.

use nalgebra::Vector3;

use crate::constants::{Degree, RADEG};
use crate::ref_system::{cartesian_to_radec, radec_to_unit_vector};
use crate::tlefit_errors::TleFitError;

/// Split a sexagesimal string into its three numeric fields.
///
/// Returns the raw first field (to keep its sign) and the parsed minutes/seconds.
fn split_sexagesimal(input: &str) -> Result<(&str, f64, f64), TleFitError> {
    let parts: Vec<&str> = input.trim().split(':').collect();
    if parts.len() != 3 {
        return Err(TleFitError::parse(
            input,
            format!("expected 3 ':'-separated fields, found {}", parts.len()),
        ));
    }

    let minutes = parse_unsigned_field(input, parts[1], "minutes")?;
    let seconds = parse_unsigned_field(input, parts[2], "seconds")?;
    if minutes >= 60.0 {
        return Err(TleFitError::parse(input, "minutes must be below 60"));
    }
    if seconds >= 60.0 {
        return Err(TleFitError::parse(input, "seconds must be below 60"));
    }

    Ok((parts[0].trim(), minutes, seconds))
}

/// Minutes and seconds are never signed on their own.
fn parse_unsigned_field(input: &str, field: &str, name: &str) -> Result<f64, TleFitError> {
    let field = field.trim();
    if field.starts_with(['-', '+']) {
        return Err(TleFitError::parse(input, format!("{name} cannot be signed")));
    }
    let value: f64 = field
        .parse()
        .map_err(|_| TleFitError::parse(input, format!("{name} field '{field}' is not numeric")))?;
    if !value.is_finite() {
        return Err(TleFitError::parse(input, format!("{name} is not finite")));
    }
    Ok(value)
}

/// Parse a right ascension `"HH:MM:SS[.sss]"` into decimal degrees.
///
/// Arguments
/// ---------
/// * `hms`: hours, minutes and seconds separated by `:`.
///
/// Returns
/// -------
/// * The right ascension in degrees (`hours × 15`).
///
/// Errors
/// ------
/// * [`TleFitError::ParseError`] on a wrong field count, a non-numeric component,
///   hours out of `[0, 24)` or minutes/seconds out of `[0, 60)`.
pub fn hms_to_decimal(hms: &str) -> Result<Degree, TleFitError> {
    let (hours_raw, minutes, seconds) = split_sexagesimal(hms)?;
    let hours = parse_unsigned_field(hms, hours_raw, "hours")?;
    if hours >= 24.0 {
        return Err(TleFitError::parse(hms, "hours must be below 24"));
    }
    Ok((hours + minutes / 60.0 + seconds / 3600.0) * 15.0)
}

/// Parse a declination `"±DD:MM:SS[.sss]"` into decimal degrees.
///
/// The sign of the degree field applies to the whole angle, so `"-00:30:00"` is `-0.5`.
///
/// Errors
/// ------
/// * [`TleFitError::ParseError`] on a wrong field count or a non-numeric component.
pub fn dms_to_decimal(dms: &str) -> Result<Degree, TleFitError> {
    let (deg_raw, minutes, seconds) = split_sexagesimal(dms)?;

    let sign = if deg_raw.starts_with('-') { -1.0 } else { 1.0 };
    let unsigned = deg_raw.trim_start_matches(['-', '+']);
    let degrees = parse_unsigned_field(dms, unsigned, "degrees")?;

    Ok(sign * (degrees + minutes / 60.0 + seconds / 3600.0))
}

/// Split a non-negative value expressed in `unit`s into (whole, minutes, seconds) with
/// `decimals` digits on the seconds, carrying rounding overflow upward.
fn to_sexagesimal(value: f64, decimals: usize) -> (u64, u64, u64, u64) {
    let scale = 10u64.pow(decimals as u32);
    let total = (value * 3600.0 * scale as f64).round() as u64;

    let frac = total % scale;
    let total_seconds = total / scale;
    (
        total_seconds / 3600,
        (total_seconds / 60) % 60,
        total_seconds % 60,
        frac,
    )
}

fn render(whole: u64, minutes: u64, seconds: u64, frac: u64, decimals: usize) -> String {
    if decimals == 0 {
        format!("{whole:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{whole:02}:{minutes:02}:{seconds:02}.{frac:0decimals$}")
    }
}

/// Render decimal degrees as a right ascension `"HH:MM:SS.sss"`.
///
/// The angle is normalized to `[0, 360)` first; `decimals` is the number of digits on
/// the seconds field.
pub fn decimal_to_hms(degrees: Degree, decimals: usize) -> String {
    let hours = degrees.rem_euclid(360.0) / 15.0;
    let (mut h, m, s, frac) = to_sexagesimal(hours, decimals);
    if h >= 24 {
        h -= 24;
    }
    render(h, m, s, frac, decimals)
}

/// Render decimal degrees as a declination `"±DD:MM:SS.sss"`.
pub fn decimal_to_dms(degrees: Degree, decimals: usize) -> String {
    let sign = if degrees < 0.0 { '-' } else { '+' };
    let (d, m, s, frac) = to_sexagesimal(degrees.abs(), decimals);
    format!("{sign}{}", render(d, m, s, frac, decimals))
}

/// Spherical → Cartesian conversion of a direction and a distance.
///
/// The unit of `distance` is carried unchanged to the output.
pub fn ra_dec_to_eci(ra_deg: Degree, dec_deg: Degree, distance: f64) -> Vector3<f64> {
    radec_to_unit_vector(ra_deg * RADEG, dec_deg * RADEG) * distance
}

/// Cartesian → (RA, Dec) in degrees, `ra ∈ [0, 360)`, `dec ∈ [−90, 90]`.
///
/// Errors
/// ------
/// * [`TleFitError::DegenerateVector`] when the vector has a (numerically) zero norm.
pub fn xyz_to_radec(v: &Vector3<f64>) -> Result<(Degree, Degree), TleFitError> {
    let (alpha, delta, _) = cartesian_to_radec(v)?;
    let ra = (alpha / RADEG).rem_euclid(360.0);
    Ok((ra, delta / RADEG))
}

/// Wrap an angle difference in degrees into `[−180, 180)`.
#[inline]
pub fn wrap_deg_180(angle: Degree) -> Degree {
    (angle + 180.0).rem_euclid(360.0) - 180.0
}

#[cfg(test)]
mod conversion_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_hms_to_decimal() {
        assert_relative_eq!(
            hms_to_decimal("22:52:23.37").unwrap(),
            343.097375,
            epsilon = 1e-10
        );
        assert_relative_eq!(hms_to_decimal("00:00:00").unwrap(), 0.0);
        assert_relative_eq!(
            hms_to_decimal("06:50:13.370").unwrap(),
            102.55570833333333,
            epsilon = 1e-10
        );
        assert!(hms_to_decimal("1:2:3.4.5").is_err());
        assert!(hms_to_decimal("12:30").is_err());
        assert!(hms_to_decimal("12:xx:00").is_err());
        assert!(hms_to_decimal("-1:00:00").is_err());
        assert!(hms_to_decimal("12:61:00").is_err());
    }

    #[test]
    fn hours_past_the_day_are_rejected() {
        match hms_to_decimal("25:00:00") {
            Err(TleFitError::ParseError { input, .. }) => assert_eq!(input, "25:00:00"),
            other => panic!("expected ParseError, got {other:?}"),
        }
        assert!(hms_to_decimal("24:00:00").is_err());
        assert_relative_eq!(
            hms_to_decimal("23:59:59.9").unwrap(),
            359.99958333333333,
            epsilon = 1e-10
        );
    }

    #[test]
    fn test_dms_to_decimal() {
        assert_relative_eq!(
            dms_to_decimal("-00:30:14.2").unwrap(),
            -0.5039444444444444,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            dms_to_decimal("+13:55:42.7").unwrap(),
            13.928527777777777,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            dms_to_decimal("89:15:50.2").unwrap(),
            89.26394444444445,
            epsilon = 1e-12
        );
        // minutes are added to the magnitude, never subtracted
        assert_relative_eq!(dms_to_decimal("-10:30:00").unwrap(), -10.5);
        assert!(dms_to_decimal("10:-30:00").is_err());
    }

    #[test]
    fn malformed_dms_is_parse_error() {
        match dms_to_decimal("-10:99") {
            Err(TleFitError::ParseError { input, .. }) => assert_eq!(input, "-10:99"),
            other => panic!("expected ParseError, got {other:?}"),
        }
    }

    #[test]
    fn hms_round_trip() {
        for s in [
            "00:00:00.000",
            "12:34:56.789",
            "23:59:59.999",
            "05:00:59.500",
            "18:07:00.001",
        ] {
            let deg = hms_to_decimal(s).unwrap();
            assert_eq!(decimal_to_hms(deg, 3), s);
        }
    }

    #[test]
    fn dms_round_trip() {
        for s in ["-00:30:14.200", "+13:55:42.700", "+89:59:59.999", "-45:00:00.000"] {
            let deg = dms_to_decimal(s).unwrap();
            assert_eq!(decimal_to_dms(deg, 3), s);
        }
    }

    #[test]
    fn hms_rendering_carries() {
        // 59.9996 s rounds up into the next minute and hour
        assert_eq!(decimal_to_hms(15.0 * (1.0 - 0.0004 / 3600.0), 3), "01:00:00.000");
        assert_eq!(decimal_to_hms(360.0, 0), "00:00:00");
        assert_eq!(decimal_to_hms(-15.0, 0), "23:00:00");
    }

    #[test]
    fn radec_cartesian() {
        let v = ra_dec_to_eci(90.0, 0.0, 7000.0);
        assert_relative_eq!(v, Vector3::new(0.0, 7000.0, 0.0), epsilon = 1e-9);

        let (ra, dec) = xyz_to_radec(&Vector3::new(-1.0, -1.0, 0.0)).unwrap();
        assert_relative_eq!(ra, 225.0, epsilon = 1e-12);
        assert_relative_eq!(dec, 0.0, epsilon = 1e-12);

        let (_, dec) = xyz_to_radec(&Vector3::new(0.0, 0.0, -3.0)).unwrap();
        assert_relative_eq!(dec, -90.0, epsilon = 1e-12);

        assert_eq!(
            xyz_to_radec(&Vector3::zeros()),
            Err(TleFitError::DegenerateVector)
        );
    }

    #[test]
    fn wrap_differences() {
        assert_relative_eq!(wrap_deg_180(359.0 - 1.0), -2.0, epsilon = 1e-12);
        assert_relative_eq!(wrap_deg_180(1.0 - 359.0), 2.0, epsilon = 1e-12);
        assert_relative_eq!(wrap_deg_180(180.0), -180.0, epsilon = 1e-12);
    }
}
