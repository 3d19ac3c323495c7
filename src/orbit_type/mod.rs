//! # Orbit representations
//!
//! - [`state_vector`](crate::orbit_type::state_vector): Cartesian [`StateVector`] (km, km/s).
//! - [`element_set`](crate::orbit_type::element_set): classical [`OrbitalElementSet`]
//!   `(a, e, i, Ω, ω, ν)` in km and degrees.
//!
//! Both are plain value types. Conversions take `µ` explicitly so that tests and
//! solvers can run in any consistent unit system.
//!
//! ## Typical workflow
//!
//! ```rust, no_run
//! use nalgebra::Vector3;
//! use tlefit::constants::MU_EARTH;
//! use tlefit::orbit_type::{OrbitalElementSet, StateVector};
//! use tlefit::time::parse_utc;
//!
//! let epoch = parse_utc("2024-04-01T00:00:00").unwrap();
//! let state = StateVector::new(
//!     epoch,
//!     Vector3::new(6771.0, 0.0, 0.0),
//!     Vector3::new(0.0, 4.79, 6.04),
//! );
//!
//! let elements = OrbitalElementSet::from_state_vector(&state, MU_EARTH).unwrap();
//! println!("{elements}");
//! ```

/// Classical element set and its conversions.
pub mod element_set;

/// Cartesian state vector.
pub mod state_vector;

pub use element_set::OrbitalElementSet;
pub use state_vector::StateVector;
