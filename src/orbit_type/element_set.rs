//! # Classical orbital element set
//!
//! [`OrbitalElementSet`] stores the osculating `(a, e, i, Ω, ω, ν)` of a bound
//! geocentric orbit at an epoch. It is the common output of every IOD method and
//! the input of the consensus and TLE stages.
//!
//! ## Degeneracies
//!
//! - **Circular orbits** (`e < 1e-10`): the periapsis is undefined, `ω = 0` and the true
//!   anomaly holds the argument of latitude `u = ω + ν`.
//! - **Equatorial orbits** (`i ≈ 0°` or `180°`): the node is undefined, `Ω = 0` and ω
//!   holds the longitude of periapsis (or ν the true longitude if also circular).
//!
//! ## Units
//!
//! - `semi_major_axis_km`: km
//! - angles: degrees in `[0, 360)`
//! - derived rates: rad/s, rev/day

use hifitime::Epoch;
use nalgebra::Vector3;
use serde::Serialize;
use std::fmt;

use crate::constants::{Degree, Kilometer, Seconds, DPI, RADEG, SECONDS_PER_DAY};
use crate::kepler::{
    eccentricity_vector, mean_to_true_anomaly, principal_angle, true_to_eccentric_anomaly,
    true_to_mean_anomaly,
};
use crate::orbit_type::state_vector::StateVector;
use crate::ref_system::{rotmt, RotationAxis};
use crate::time::seconds_between;
use crate::tlefit_errors::{IodFailureKind, TleFitError};

/// Below this eccentricity the periapsis direction is not defined.
pub const CIRCULAR_ECCENTRICITY: f64 = 1e-10;

/// Relative node-vector length below which the orbit is treated as equatorial.
const EQUATORIAL_TOLERANCE: f64 = 1e-10;

/// Osculating classical elements of a bound orbit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OrbitalElementSet {
    pub epoch: Epoch,
    pub semi_major_axis_km: Kilometer,
    pub eccentricity: f64,
    pub inclination_deg: Degree,
    pub raan_deg: Degree,
    pub arg_perigee_deg: Degree,
    pub true_anomaly_deg: Degree,
}

/// Oriented angle from `from` to `to` about `axis`, in `[0, 2π)`.
fn angle_about(from: &Vector3<f64>, to: &Vector3<f64>, axis: &Vector3<f64>) -> f64 {
    principal_angle(from.cross(to).dot(axis).atan2(from.dot(to)))
}

fn wrap_360(angle: Degree) -> Degree {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

impl OrbitalElementSet {
    /// Element set from explicit values, angles normalized to `[0, 360)`.
    ///
    /// Errors
    /// ----------
    /// * [`IodFailureKind::UnboundOrbit`] when `e ∉ [0, 1)` or `a ≤ 0`.
    pub fn new(
        epoch: Epoch,
        semi_major_axis_km: Kilometer,
        eccentricity: f64,
        inclination_deg: Degree,
        raan_deg: Degree,
        arg_perigee_deg: Degree,
        true_anomaly_deg: Degree,
    ) -> Result<Self, TleFitError> {
        if !(0.0..1.0).contains(&eccentricity) || !(semi_major_axis_km > 0.0) {
            return Err(IodFailureKind::UnboundOrbit { eccentricity }.into());
        }
        Ok(OrbitalElementSet {
            epoch,
            semi_major_axis_km,
            eccentricity,
            inclination_deg,
            raan_deg: wrap_360(raan_deg),
            arg_perigee_deg: wrap_360(arg_perigee_deg),
            true_anomaly_deg: wrap_360(true_anomaly_deg),
        })
    }

    /// Convert a Cartesian state into classical elements.
    ///
    /// Arguments
    /// -----------------
    /// * `state`: position (km) and velocity (km/s) at `state.epoch`.
    /// * `mu`: gravitational parameter in km³/s².
    ///
    /// Errors
    /// ----------
    /// * [`TleFitError::DegenerateVector`] for a zero position or a rectilinear state.
    /// * [`IodFailureKind::UnboundOrbit`] when `e ≥ 1` (parabolic or hyperbolic).
    pub fn from_state_vector(state: &StateVector, mu: f64) -> Result<Self, TleFitError> {
        let r = state.position;
        let v = state.velocity;
        let r_norm = r.norm();
        let h = state.angular_momentum();
        let h_norm = h.norm();
        if !(r_norm > 0.0 && h_norm > 0.0) || !h_norm.is_finite() {
            return Err(TleFitError::DegenerateVector);
        }
        let h_hat = h / h_norm;

        let e_vec = eccentricity_vector(&r, &v, mu);
        let ecc = e_vec.norm();
        let inv_a = -2.0 * state.specific_energy(mu) / mu;
        if ecc >= 1.0 || inv_a <= 0.0 {
            return Err(IodFailureKind::UnboundOrbit { eccentricity: ecc }.into());
        }
        let a = 1.0 / inv_a;

        let inclination = (h.z / h_norm).clamp(-1.0, 1.0).acos();
        let node = Vector3::z().cross(&h);
        let equatorial = node.norm() < EQUATORIAL_TOLERANCE * h_norm;
        let circular = ecc < CIRCULAR_ECCENTRICITY;

        let node_dir = if equatorial {
            Vector3::x()
        } else {
            node / node.norm()
        };
        let raan = if equatorial {
            0.0
        } else {
            principal_angle(node.y.atan2(node.x))
        };

        let (arg_perigee, true_anomaly) = if circular {
            // argument of latitude (or true longitude) carried by ν
            (0.0, angle_about(&node_dir, &r, &h_hat))
        } else {
            (
                angle_about(&node_dir, &e_vec, &h_hat),
                angle_about(&e_vec, &r, &h_hat),
            )
        };

        OrbitalElementSet::new(
            state.epoch,
            a,
            if circular { 0.0 } else { ecc },
            inclination / RADEG,
            raan / RADEG,
            arg_perigee / RADEG,
            true_anomaly / RADEG,
        )
    }

    /// Cartesian state (km, km/s) equivalent to these elements.
    pub fn to_state_vector(&self, mu: f64) -> StateVector {
        let p = self.semi_latus_rectum_km();
        let nu = self.true_anomaly_deg * RADEG;
        let (sin_nu, cos_nu) = nu.sin_cos();
        let r = p / (1.0 + self.eccentricity * cos_nu);

        let r_pf = Vector3::new(r * cos_nu, r * sin_nu, 0.0);
        let v_pf = (mu / p).sqrt() * Vector3::new(-sin_nu, self.eccentricity + cos_nu, 0.0);

        let rot = rotmt(self.raan_deg * RADEG, RotationAxis::Z)
            * rotmt(self.inclination_deg * RADEG, RotationAxis::X)
            * rotmt(self.arg_perigee_deg * RADEG, RotationAxis::Z);

        StateVector::new(self.epoch, rot * r_pf, rot * v_pf)
    }

    /// Semi-latus rectum `p = a(1 − e²)` in km.
    pub fn semi_latus_rectum_km(&self) -> Kilometer {
        self.semi_major_axis_km * (1.0 - self.eccentricity * self.eccentricity)
    }

    /// Eccentric anomaly in degrees, `[0, 360)`.
    pub fn eccentric_anomaly_deg(&self) -> Degree {
        wrap_360(
            principal_angle(true_to_eccentric_anomaly(
                self.true_anomaly_deg * RADEG,
                self.eccentricity,
            )) / RADEG,
        )
    }

    /// Mean anomaly in degrees, `[0, 360)`.
    pub fn mean_anomaly_deg(&self) -> Degree {
        wrap_360(true_to_mean_anomaly(self.true_anomaly_deg * RADEG, self.eccentricity) / RADEG)
    }

    /// Mean motion `n = sqrt(µ/a³)` in rad/s.
    pub fn mean_motion_rad_s(&self, mu: f64) -> f64 {
        (mu / self.semi_major_axis_km.powi(3)).sqrt()
    }

    /// Mean motion in revolutions per day.
    pub fn mean_motion_rev_per_day(&self, mu: f64) -> f64 {
        self.mean_motion_rad_s(mu) * SECONDS_PER_DAY / DPI
    }

    /// Orbital period in seconds.
    pub fn period_s(&self, mu: f64) -> Seconds {
        DPI / self.mean_motion_rad_s(mu)
    }

    /// Argument of latitude `ω + ν` in degrees, `[0, 360)`.
    pub fn argument_of_latitude_deg(&self) -> Degree {
        wrap_360(self.arg_perigee_deg + self.true_anomaly_deg)
    }

    /// Move the set to `epoch` by Keplerian mean-anomaly drift.
    ///
    /// Shape and orientation are unchanged; only the anomaly advances by `n·Δt`.
    pub fn propagate_to(&self, epoch: Epoch, mu: f64) -> Result<Self, TleFitError> {
        let dt = seconds_between(self.epoch, epoch);
        let mean_anomaly =
            principal_angle(self.mean_anomaly_deg() * RADEG + self.mean_motion_rad_s(mu) * dt);
        let true_anomaly = mean_to_true_anomaly(mean_anomaly, self.eccentricity)?;
        Ok(OrbitalElementSet {
            epoch,
            true_anomaly_deg: wrap_360(true_anomaly / RADEG),
            ..*self
        })
    }
}

impl fmt::Display for OrbitalElementSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Orbital elements @ epoch (UTC): {}", self.epoch)?;
        writeln!(f, "-------------------------------------------")?;
        writeln!(
            f,
            "  a   (semi-major axis)       = {:.6} km",
            self.semi_major_axis_km
        )?;
        writeln!(f, "  e   (eccentricity)          = {:.7}", self.eccentricity)?;
        writeln!(f, "  i   (inclination)           = {:.6}°", self.inclination_deg)?;
        writeln!(f, "  Ω   (right ascension node)  = {:.6}°", self.raan_deg)?;
        writeln!(f, "  ω   (argument of perigee)   = {:.6}°", self.arg_perigee_deg)?;
        write!(f, "  ν   (true anomaly)          = {:.6}°", self.true_anomaly_deg)
    }
}
