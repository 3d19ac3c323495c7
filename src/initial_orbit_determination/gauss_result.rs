//! # Gauss orbit determination result
//!
//! [`GaussResult`] tells apart the two stages of the Gauss method:
//!
//! - **`PrelimOrbit`**: state obtained directly from a root of the 8th-degree
//!   polynomial and the Gibbs/Herrick-Gibbs velocity, without refinement.
//! - **`CorrectedOrbit`**: state after the f/g refinement loop converged.
//!
//! Both wrap a [`GaussSolution`] (middle-epoch state and the three slant ranges),
//! which is what the windowed aggregation and the consensus stage need.

use nalgebra::Vector3;
use std::fmt;

use crate::constants::MU_EARTH;
use crate::orbit_type::{OrbitalElementSet, StateVector};
use crate::tlefit_errors::TleFitError;

/// State at the middle observation and the slant ranges (km) of the three observations.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussSolution {
    pub state: StateVector,
    pub ranges_km: Vector3<f64>,
}

impl GaussSolution {
    /// Osculating elements of the solution.
    pub fn elements(&self) -> Result<OrbitalElementSet, TleFitError> {
        OrbitalElementSet::from_state_vector(&self.state, MU_EARTH)
    }
}

#[derive(PartialEq, Clone, Debug)]
pub enum GaussResult {
    PrelimOrbit(GaussSolution),
    CorrectedOrbit(GaussSolution),
}

impl GaussResult {
    pub fn is_prelim(&self) -> bool {
        matches!(self, GaussResult::PrelimOrbit(_))
    }

    pub fn is_corrected(&self) -> bool {
        matches!(self, GaussResult::CorrectedOrbit(_))
    }

    pub fn solution(&self) -> &GaussSolution {
        match self {
            GaussResult::PrelimOrbit(s) | GaussResult::CorrectedOrbit(s) => s,
        }
    }

    pub fn into_inner(self) -> GaussSolution {
        match self {
            GaussResult::PrelimOrbit(s) | GaussResult::CorrectedOrbit(s) => s,
        }
    }
}

impl fmt::Display for GaussResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = if self.is_corrected() {
            "Corrected Orbit"
        } else {
            "Preliminary Orbit"
        };
        let s = self.solution();
        writeln!(f, "Gauss IOD Result: {stage}")?;
        writeln!(
            f,
            "  ρ = [{:.3}, {:.3}, {:.3}] km",
            s.ranges_km.x, s.ranges_km.y, s.ranges_km.z
        )?;
        write!(f, "{}", s.state)
    }
}
