//! Reader for observation tables stored as CSV.
//!
//! Expected header (the range column is optional):
//!
//! ```text
//! timestamp,ra_deg,dec_deg,observer_x_km,observer_y_km,observer_z_km,range_km
//! 2024-06-01T02:00:00.125,123.4567,-12.3456,4123.1,-1234.5,4567.8,
//! ```

use camino::Utf8Path;
use log::debug;
use nalgebra::Vector3;
use serde::Deserialize;
use std::io;

use crate::observations::Observation;
use crate::time::parse_utc;
use crate::tlefit_errors::TleFitError;

#[derive(Debug, Deserialize)]
struct ObservationRow {
    timestamp: String,
    ra_deg: f64,
    dec_deg: f64,
    observer_x_km: f64,
    observer_y_km: f64,
    observer_z_km: f64,
    #[serde(default)]
    range_km: Option<f64>,
}

impl TryFrom<ObservationRow> for Observation {
    type Error = TleFitError;

    fn try_from(row: ObservationRow) -> Result<Self, Self::Error> {
        let timestamp = parse_utc(&row.timestamp)?;
        let obs = Observation::new(
            timestamp,
            row.ra_deg,
            row.dec_deg,
            Vector3::new(row.observer_x_km, row.observer_y_km, row.observer_z_km),
        );
        Ok(match row.range_km {
            Some(range) => obs.with_range(range),
            None => obs,
        })
    }
}

/// Read observations from any CSV source.
pub fn read_observations_from_reader<R: io::Read>(
    reader: R,
) -> Result<Vec<Observation>, TleFitError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let observations = csv_reader
        .deserialize::<ObservationRow>()
        .map(|row| Observation::try_from(row?))
        .collect::<Result<Vec<_>, _>>()?;

    debug!("read {} observations", observations.len());
    Ok(observations)
}

/// Read observations from a CSV file.
///
/// Errors
/// ----------
/// * [`TleFitError::IoError`] if the file cannot be opened.
/// * [`TleFitError::CsvError`] on a malformed row.
/// * [`TleFitError::ParseError`] on a malformed timestamp.
pub fn read_observations(path: &Utf8Path) -> Result<Vec<Observation>, TleFitError> {
    let file = std::fs::File::open(path.as_std_path())?;
    read_observations_from_reader(io::BufReader::new(file))
}
