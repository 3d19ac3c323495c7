pub mod consensus;
pub mod constants;
pub mod conversion;
pub mod extraction;
pub mod initial_orbit_determination;
pub mod kepler;
pub mod observations;
pub mod observers;
pub mod orbit_type;
pub mod pipeline;
pub mod ref_system;
pub mod residuals;
pub mod time;
pub mod tle;
pub mod tlefit_errors;

pub use initial_orbit_determination::{IODParams, IodMethod, IodSolver};
pub use observations::Observation;
pub use orbit_type::{OrbitalElementSet, StateVector};
pub use pipeline::OrbitPipeline;
pub use tle::{TleHeader, TleRecord};
pub use tlefit_errors::TleFitError;
