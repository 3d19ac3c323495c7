use chrono::{NaiveDate, NaiveDateTime};
use hifitime::{Epoch, Unit};
use std::str::FromStr;

use crate::constants::{Seconds, DPI, SECONDS_PER_DAY, T2000};
use crate::tlefit_errors::TleFitError;

/// Parse an ISO-8601 timestamp into a UTC [`Epoch`].
///
/// A timestamp without an explicit time scale is read as UTC.
///
/// Argument
/// --------
/// * `date`: a date in the format `YYYY-MM-ddTHH:mm:ss[.ffffff]`
///
/// Return
/// ------
/// * the epoch, or a [`TleFitError::ParseError`] on malformed input
pub fn parse_utc(date: &str) -> Result<Epoch, TleFitError> {
    Epoch::from_str(date.trim()).map_err(|e| TleFitError::parse(date, e.to_string()))
}

/// Shift an epoch by a (possibly negative) number of seconds.
#[inline]
pub fn add_seconds(epoch: Epoch, seconds: Seconds) -> Epoch {
    epoch + Unit::Second * seconds
}

/// Signed interval `to - from` in seconds.
#[inline]
pub fn seconds_between(from: Epoch, to: Epoch) -> Seconds {
    (to - from).to_seconds()
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Day of year of `epoch` (1 on January 1st) plus the UTC fraction of the day.
///
/// This is the `DDD.DDDDDDDD` quantity of the TLE epoch field.
pub fn day_of_year_fraction(epoch: Epoch) -> f64 {
    const CUMULATIVE_DAYS: [u32; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];

    let (year, month, day, hour, minute, second, nanos) = epoch.to_gregorian_utc();
    let mut doy = CUMULATIVE_DAYS[(month as usize).saturating_sub(1).min(11)] + day as u32;
    if month > 2 && is_leap_year(year) {
        doy += 1;
    }

    let seconds_of_day = hour as f64 * 3600.0
        + minute as f64 * 60.0
        + second as f64
        + nanos as f64 * 1e-9;
    doy as f64 + seconds_of_day / SECONDS_PER_DAY
}

/// UTC calendar year of `epoch`.
pub fn utc_year(epoch: Epoch) -> i32 {
    epoch.to_gregorian_utc().0
}

/// Two-digit year of the TLE epoch field (`year mod 100`).
pub fn two_digit_year(epoch: Epoch) -> u32 {
    utc_year(epoch).rem_euclid(100) as u32
}

/// Two-digit year and day of year as printed in the TLE epoch field.
///
/// The day is rounded to 8 decimals; a day that rounds past the end of the
/// year is carried into January 1st of the next one.
pub fn tle_epoch_field(epoch: Epoch) -> (u32, f64) {
    let year = utc_year(epoch);
    let day = (day_of_year_fraction(epoch) * 1e8).round() / 1e8;
    let days_in_year = if is_leap_year(year) { 366.0 } else { 365.0 };
    if day >= days_in_year + 1.0 {
        ((year + 1).rem_euclid(100) as u32, 1.0)
    } else {
        (two_digit_year(epoch), day)
    }
}

/// Convert a UTC [`Epoch`] into the calendar representation expected by `sgp4`.
pub fn to_naive_utc(epoch: Epoch) -> Result<NaiveDateTime, TleFitError> {
    let (year, month, day, hour, minute, second, nanos) = epoch.to_gregorian_utc();
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
        .and_then(|d| d.and_hms_nano_opt(hour as u32, minute as u32, (second as u32).min(59), nanos))
        .ok_or_else(|| TleFitError::parse(&epoch.to_string(), "not representable as a UTC calendar date"))
}

/// Compute the Greenwich Mean Sidereal Time (GMST) in radians
/// for a given Modified Julian Date.
///
/// This function implements the IAU 1982 polynomial formula
/// for the mean sidereal time at 0h UT1, plus the fractional-day
/// correction term due to Earth's rotation rate. It is the same model used by
/// SGP4 to relate TEME to the Earth-fixed frame.
///
/// # Arguments
/// * `tjm` - Modified Julian Date. UTC is used in place of UT1 (|UT1 − UTC| < 0.9 s).
///
/// # Returns
/// * GMST angle in radians, normalized to the interval [0, 2π).
///
/// # References
/// * IAU 1982, Explanatory Supplement to the Astronomical Almanac (1992).
pub fn gmst(tjm: f64) -> f64 {
    // Polynomial coefficients for GMST at 0h UT1 (in seconds)
    const C0: f64 = 24110.54841;
    const C1: f64 = 8640184.812866;
    const C2: f64 = 9.3104e-2;
    const C3: f64 = -6.2e-6;

    // Ratio of sidereal day to solar day
    const RAP: f64 = 1.00273790934;

    let itjm = tjm.floor();
    let t = (itjm - T2000) / 36525.0;

    // GMST at 0h in seconds, then radians
    let gmst0 = (((C3 * t + C2) * t + C1) * t + C0) * DPI / SECONDS_PER_DAY;

    // Rotation accumulated during the fraction of the day
    let h = tjm.fract() * DPI;
    (gmst0 + h * RAP).rem_euclid(DPI)
}

/// GMST at a UTC epoch.
#[inline]
pub fn gmst_at(epoch: Epoch) -> f64 {
    gmst(epoch.to_mjd_utc_days())
}

#[cfg(test)]
mod time_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_utc() {
        let epoch = parse_utc("2021-01-01T00:00:00").unwrap();
        assert_eq!(epoch.to_mjd_utc_days(), 59215.0);
        assert!(parse_utc("2021-13-45T99:00:00").is_err());
        assert!(parse_utc("yesterday").is_err());
    }

    #[test]
    fn test_seconds_arithmetic() {
        let t0 = parse_utc("2024-06-01T00:00:00").unwrap();
        let t1 = add_seconds(t0, 60.5);
        assert_relative_eq!(seconds_between(t0, t1), 60.5, epsilon = 1e-9);
        assert_relative_eq!(seconds_between(t1, t0), -60.5, epsilon = 1e-9);
        // microsecond steps are preserved
        let t2 = add_seconds(t0, 1e-6);
        assert_relative_eq!(seconds_between(t0, t2), 1e-6, epsilon = 1e-12);
    }

    #[test]
    fn test_day_of_year() {
        let t = parse_utc("2008-09-20T12:25:40.104192").unwrap();
        assert_relative_eq!(day_of_year_fraction(t), 264.51782528, epsilon = 1e-8);

        let jan1 = parse_utc("2023-01-01T00:00:00").unwrap();
        assert_relative_eq!(day_of_year_fraction(jan1), 1.0);

        let dec31_leap = parse_utc("2024-12-31T18:00:00").unwrap();
        assert_relative_eq!(day_of_year_fraction(dec31_leap), 366.75);
        assert_eq!(utc_year(dec31_leap), 2024);
        assert_eq!(two_digit_year(dec31_leap), 24);
        assert_eq!(two_digit_year(parse_utc("2000-03-01T00:00:00").unwrap()), 0);
    }

    #[test]
    fn test_tle_epoch_field() {
        let t = parse_utc("2008-09-20T12:25:40.104192").unwrap();
        let (year, day) = tle_epoch_field(t);
        assert_eq!(year, 8);
        assert_relative_eq!(day, 264.51782528, epsilon = 1e-12);

        let new_year = parse_utc("2024-01-01T00:00:00").unwrap();
        assert_eq!(tle_epoch_field(add_seconds(new_year, -1e-7)), (24, 1.0));
        assert_eq!(tle_epoch_field(add_seconds(new_year, -2.0)), (23, 365.99997685));

        let leap_end = parse_utc("2025-01-01T00:00:00").unwrap();
        assert_eq!(tle_epoch_field(add_seconds(leap_end, -1e-7)), (25, 1.0));
        let century = parse_utc("2100-01-01T00:00:00").unwrap();
        assert_eq!(tle_epoch_field(add_seconds(century, -1e-7)), (0, 1.0));
    }

    #[test]
    fn test_to_naive_utc() {
        let t = parse_utc("2024-02-29T23:59:30.25").unwrap();
        let naive = to_naive_utc(t).unwrap();
        assert_eq!(naive.to_string(), "2024-02-29 23:59:30.250");
    }

    #[test]
    fn test_gmst() {
        let tut = 57028.478514610404;
        assert_relative_eq!(gmst(tut), 4.851925725092499, epsilon = 1e-12);

        let tut = T2000;
        assert_relative_eq!(gmst(tut), 4.894961212789145, epsilon = 1e-12);
    }

    #[test]
    fn gmst_matches_sgp4_sidereal_time() {
        let t = parse_utc("2024-03-15T06:30:00").unwrap();
        let naive = to_naive_utc(t).unwrap();
        let reference = sgp4::iau_epoch_to_sidereal_time(sgp4::julian_years_since_j2000(&naive));
        let diff = (gmst_at(t) - reference.rem_euclid(DPI) + std::f64::consts::PI)
            .rem_euclid(DPI)
            - std::f64::consts::PI;
        assert!(diff.abs() < 1e-6, "GMST mismatch {diff}");
    }
}
