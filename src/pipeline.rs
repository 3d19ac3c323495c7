//! # Observation-to-TLE pipeline
//!
//! [`OrbitPipeline`] chains the stages of the crate with explicit inputs:
//!
//! 1. initial orbit determination with the selected [`IodMethod`]; Gauss on more than
//!    three observations runs over every consecutive window and averages the window
//!    element sets ([`WindowedGauss`]),
//! 2. rendering of the element set as a TLE, optionally through the SGP4
//!    mean-element fit ([`fit_mean_elements`]).
//!
//! ```rust,no_run
//! use camino::Utf8Path;
//! use tlefit::observations::csv_reader::read_observations;
//! use tlefit::pipeline::OrbitPipeline;
//! use tlefit::tle::TleHeader;
//!
//! let observations = read_observations(Utf8Path::new("track.csv")).unwrap();
//! let solution = OrbitPipeline::default()
//!     .with_header(TleHeader::new(25544))
//!     .run(&observations)
//!     .unwrap();
//! println!("{}", solution.tle);
//! ```

use log::info;

use crate::constants::MU_EARTH;
use crate::initial_orbit_determination::windowed::WindowedGauss;
use crate::initial_orbit_determination::{IODParams, IodMethod, IodSolver};
use crate::observations::Observation;
use crate::orbit_type::OrbitalElementSet;
use crate::residuals::{evaluate_residuals, ResidualSample};
use crate::tle::fit::fit_mean_elements;
use crate::tle::{TleHeader, TleRecord};
use crate::tlefit_errors::TleFitError;

/// Configuration of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitPipeline {
    pub method: IodMethod,
    pub params: IODParams,
    pub header: TleHeader,
    /// Adjust the TLE so that SGP4 reproduces the determined state at epoch.
    pub sgp4_fit: bool,
}

impl Default for OrbitPipeline {
    fn default() -> Self {
        OrbitPipeline {
            method: IodMethod::Gauss,
            params: IODParams::default(),
            header: TleHeader::default(),
            sgp4_fit: true,
        }
    }
}

/// Result of [`OrbitPipeline::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitSolution {
    pub method: IodMethod,
    /// Osculating two-body elements of the determination.
    pub elements: OrbitalElementSet,
    pub tle: TleRecord,
    /// SGP4-at-epoch position miss of the TLE, km (`None` without the fit).
    pub sgp4_position_error_km: Option<f64>,
    /// Number of Gauss windows averaged (`None` for single solutions).
    pub windows_used: Option<usize>,
}

impl OrbitPipeline {
    pub fn new(method: IodMethod, params: IODParams, header: TleHeader) -> Self {
        OrbitPipeline {
            method,
            params,
            header,
            sgp4_fit: true,
        }
    }

    pub fn with_method(mut self, method: IodMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_params(mut self, params: IODParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_header(mut self, header: TleHeader) -> Self {
        self.header = header;
        self
    }

    pub fn with_sgp4_fit(mut self, enabled: bool) -> Self {
        self.sgp4_fit = enabled;
        self
    }

    /// Orbit determination alone. Returns the element set and, for windowed Gauss,
    /// the number of windows that entered the average.
    pub fn determine(
        &self,
        observations: &[Observation],
    ) -> Result<(OrbitalElementSet, Option<usize>), TleFitError> {
        if self.method == IodMethod::Gauss && observations.len() > 3 {
            let run = WindowedGauss::run(observations, &self.params)?;
            info!(
                "windowed gauss: {}/{} windows solved",
                run.solutions.len(),
                run.solutions.len() + run.failures.len()
            );
            let elements = run.consensus(None)?;
            return Ok((elements, Some(run.solutions.len())));
        }

        info!(
            "{} on {} observations",
            self.method.name(),
            observations.len()
        );
        Ok((self.method.solve(observations, &self.params)?, None))
    }

    /// Render `elements` with the configured header, fitted for SGP4 if enabled.
    pub fn format(
        &self,
        elements: &OrbitalElementSet,
    ) -> Result<(TleRecord, Option<f64>), TleFitError> {
        if !self.sgp4_fit {
            return Ok((TleRecord::from_elements(elements, &self.header)?, None));
        }
        let fit = fit_mean_elements(&elements.to_state_vector(MU_EARTH), &self.header)?;
        info!(
            "sgp4 mean-element fit: {:.3} km after {} iterations",
            fit.position_error_km, fit.iterations
        );
        Ok((fit.record, Some(fit.position_error_km)))
    }

    /// Observations → element set → TLE.
    ///
    /// Errors
    /// ----------
    /// * IOD errors of the selected method (for windowed Gauss, only when no window
    ///   could be solved or the batch itself is invalid).
    /// * [`TleFitError::FormatError`] when the solution cannot be rendered.
    pub fn run(&self, observations: &[Observation]) -> Result<OrbitSolution, TleFitError> {
        let (elements, windows_used) = self.determine(observations)?;
        info!(
            "elements at {}: a = {:.3} km, e = {:.6}, i = {:.4}°",
            elements.epoch,
            elements.semi_major_axis_km,
            elements.eccentricity,
            elements.inclination_deg
        );
        let (tle, sgp4_position_error_km) = self.format(&elements)?;
        Ok(OrbitSolution {
            method: self.method,
            elements,
            tle,
            sgp4_position_error_km,
            windows_used,
        })
    }
}

impl OrbitSolution {
    /// Residuals of the emitted TLE against `observations`.
    pub fn residuals(
        &self,
        observations: &[Observation],
    ) -> Result<Vec<ResidualSample>, TleFitError> {
        evaluate_residuals(&self.tle, observations)
    }
}

#[cfg(test)]
mod pipeline_test {
    use super::*;
    use crate::initial_orbit_determination::test_scenario::leo_observations;
    use crate::residuals::ResidualSummary;
    use crate::tle::verify_line;
    use approx::assert_relative_eq;

    #[test]
    fn windowed_gauss_to_fitted_tle() {
        let obs = leo_observations(60.0);
        let pipeline = OrbitPipeline::default().with_header(TleHeader::new(25544));
        let solution = pipeline.run(&obs).unwrap();

        assert_eq!(solution.windows_used, Some(2));
        assert_relative_eq!(solution.elements.semi_major_axis_km, 6_771.0, epsilon = 1e-2);
        assert!(solution.sgp4_position_error_km.unwrap() < 0.1);
        assert!(verify_line(&solution.tle.line1()));
        assert!(verify_line(&solution.tle.line2()));

        let summary = ResidualSummary::from_samples(&solution.residuals(&obs).unwrap()).unwrap();
        assert_eq!(summary.count, obs.len());
        assert!(summary.max_abs_ra_deg < 0.1 && summary.max_abs_dec_deg < 0.1);
    }

    #[test]
    fn single_triplet_without_fit() {
        let obs = leo_observations(60.0);
        let solution = OrbitPipeline::default()
            .with_method(IodMethod::Gooding)
            .with_sgp4_fit(false)
            .run(&obs[..3])
            .unwrap();
        assert_eq!(solution.windows_used, None);
        assert_eq!(solution.sgp4_position_error_km, None);
        assert_eq!(solution.tle.norad_id(), 99_999);
        assert_relative_eq!(
            solution.tle.mean_motion_rev_per_day(),
            solution.elements.mean_motion_rev_per_day(MU_EARTH),
            epsilon = 1e-8
        );
    }

    #[test]
    fn short_batch_fails() {
        let obs = leo_observations(60.0);
        assert!(OrbitPipeline::default().run(&obs[..2]).is_err());
    }
}
