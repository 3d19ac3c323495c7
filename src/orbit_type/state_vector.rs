use hifitime::Epoch;
use nalgebra::Vector3;
use std::fmt;

use crate::constants::Seconds;
use crate::kepler;
use crate::time::add_seconds;
use crate::tlefit_errors::TleFitError;

/// Geocentric inertial state of the satellite.
///
/// Units
/// -----
/// * `position`: km (TEME-aligned inertial frame).
/// * `velocity`: km/s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateVector {
    pub epoch: Epoch,
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
}

impl StateVector {
    pub fn new(epoch: Epoch, position: Vector3<f64>, velocity: Vector3<f64>) -> Self {
        StateVector {
            epoch,
            position,
            velocity,
        }
    }

    /// Specific orbital energy `v²/2 − µ/r` in km²/s².
    pub fn specific_energy(&self, mu: f64) -> f64 {
        0.5 * self.velocity.norm_squared() - mu / self.position.norm()
    }

    /// Specific angular momentum `r × v` in km²/s.
    pub fn angular_momentum(&self) -> Vector3<f64> {
        self.position.cross(&self.velocity)
    }

    /// Two-body propagation of the state by `dt` seconds.
    pub fn propagate(&self, dt: Seconds, mu: f64) -> Result<StateVector, TleFitError> {
        let (position, velocity) = kepler::propagate(&self.position, &self.velocity, dt, mu)?;
        Ok(StateVector {
            epoch: add_seconds(self.epoch, dt),
            position,
            velocity,
        })
    }
}

impl fmt::Display for StateVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "State vector @ {}", self.epoch)?;
        writeln!(
            f,
            "  r = [{:>14.6}, {:>14.6}, {:>14.6}] km",
            self.position.x, self.position.y, self.position.z
        )?;
        write!(
            f,
            "  v = [{:>14.9}, {:>14.9}, {:>14.9}] km/s",
            self.velocity.x, self.velocity.y, self.velocity.z
        )
    }
}
