//! # Windowed Gauss
//!
//! Runs the Gauss method over every consecutive triplet `(i, i+1, i+2)` of a batch.
//! Each successful window contributes a slant-range estimate to each of its three
//! observations; the per-index mean of these estimates turns every observation into
//! a *virtual* geocentric position. Windows that fail with a skippable error are
//! logged and recorded with their starting index, the rest of the batch continues.

use itertools::Itertools;
use log::{debug, warn};
use nalgebra::Vector3;
use std::collections::BTreeMap;

use hifitime::Epoch;

use crate::consensus::{mean_elements, mean_ranges};
use crate::initial_orbit_determination::gauss::GaussObs;
use crate::initial_orbit_determination::gauss_result::GaussResult;
use crate::initial_orbit_determination::IODParams;
use crate::observations::{check_batch, Observation};
use crate::orbit_type::OrbitalElementSet;
use crate::tlefit_errors::{IodFailureKind, TleFitError};

/// Outcome of one Gauss window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSolution {
    pub indices: [usize; 3],
    pub result: GaussResult,
}

/// Aggregated results of a windowed Gauss run.
#[derive(Debug)]
pub struct WindowedGauss {
    pub solutions: Vec<WindowSolution>,
    /// Starting index and error of every failed window.
    pub failures: Vec<(usize, TleFitError)>,
    ranges: BTreeMap<usize, Vec<f64>>,
    line_of_sight: Vec<(Vector3<f64>, Vector3<f64>)>,
}

impl WindowedGauss {
    /// Gauss over every consecutive triplet of `observations`.
    ///
    /// Errors
    /// ----------
    /// * [`IodFailureKind::NotEnoughObservations`] below three observations.
    /// * [`IodFailureKind::NotChronological`] for an unordered batch.
    /// * Any non-skippable error raised by a window.
    pub fn run(observations: &[Observation], params: &IODParams) -> Result<Self, TleFitError> {
        check_batch(observations, 3)?;

        let mut solutions = Vec::new();
        let mut failures = Vec::new();
        let mut ranges: BTreeMap<usize, Vec<f64>> = BTreeMap::new();

        for (i, j, k) in (0..observations.len()).tuple_windows() {
            let outcome = GaussObs::from_observations(observations, [i, j, k])
                .and_then(|window| window.prelim_orbit(params));
            match outcome {
                Ok(result) => {
                    for (idx, rho) in [i, j, k].iter().zip(result.solution().ranges_km.iter()) {
                        ranges.entry(*idx).or_default().push(*rho);
                    }
                    solutions.push(WindowSolution {
                        indices: [i, j, k],
                        result,
                    });
                }
                Err(e) if e.is_skippable() => {
                    warn!("gauss window starting at {i} skipped: {e}");
                    failures.push((i, e));
                }
                Err(e) => return Err(e),
            }
        }

        debug!(
            "windowed gauss: {} windows solved, {} skipped",
            solutions.len(),
            failures.len()
        );
        Ok(WindowedGauss {
            solutions,
            failures,
            ranges,
            line_of_sight: observations
                .iter()
                .map(|o| (o.observer_position, o.line_of_sight()))
                .collect(),
        })
    }

    /// Every range estimate (km) collected for each observation index.
    pub fn range_estimates(&self) -> &BTreeMap<usize, Vec<f64>> {
        &self.ranges
    }

    /// Mean slant range (km) per observation index.
    pub fn mean_ranges(&self) -> BTreeMap<usize, f64> {
        mean_ranges(&self.ranges)
    }

    /// Geocentric position (km) of each observation at its mean range.
    pub fn virtual_positions(&self) -> BTreeMap<usize, Vector3<f64>> {
        self.mean_ranges()
            .into_iter()
            .filter_map(|(idx, rho)| {
                self.line_of_sight
                    .get(idx)
                    .map(|(observer, los)| (idx, observer + rho * los))
            })
            .collect()
    }

    /// Element set of every solved window.
    pub fn element_sets(&self) -> Result<Vec<OrbitalElementSet>, TleFitError> {
        self.solutions
            .iter()
            .map(|w| w.result.solution().elements())
            .collect()
    }

    /// Average of the window element sets at `reference_epoch` (mean epoch if `None`).
    ///
    /// Errors
    /// ----------
    /// * [`IodFailureKind::NoRootsFound`] when no window produced a solution.
    pub fn consensus(&self, reference_epoch: Option<Epoch>) -> Result<OrbitalElementSet, TleFitError> {
        if self.solutions.is_empty() {
            return Err(IodFailureKind::NoRootsFound.into());
        }
        mean_elements(&self.element_sets()?, reference_epoch)
    }
}
