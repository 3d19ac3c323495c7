//! # Initial Orbit Determination (IOD)
//!
//! Angles-only and position-based solvers that turn a handful of [`Observation`]s
//! into an [`OrbitalElementSet`].
//!
//! ## Methods
//!
//! | Method | Inputs | Module |
//! |---|---|---|
//! | Gauss (+ f/g refinement) | 3 lines of sight | [`gauss`] |
//! | Laplace | 3 lines of sight | [`laplace`] |
//! | Multi-Laplace | N ≥ 3 lines of sight | [`laplace`] |
//! | Gooding | 3 lines of sight | [`gooding`] |
//! | Double-R | 3 lines of sight | [`double_r`] |
//! | Circular approximation | 2 or 3 lines of sight | [`circular`] |
//! | Windowed Gauss | N ≥ 3 lines of sight | [`windowed`] |
//! | Gibbs / Herrick-Gibbs | 3 positions | [`gibbs`] |
//!
//! Every solver implements [`IodSolver`] and is selected through the [`IodMethod`] enum.
//!
//! ## Units
//!
//! The angles-only solvers run in **canonical Earth units**: the distance unit is the
//! equatorial radius (6378.137 km) and the time unit `sqrt(DU³/µ)` (≈ 806.8 s), so
//! that `µ = 1`. Results are converted back to km and km/s before leaving the module.
//!
//! ## Configuration
//!
//! [`IODParams`] collects every tolerance and iteration cap. Build it with
//! [`IODParams::builder`] to get validation:
//!
//! ```rust,no_run
//! use tlefit::initial_orbit_determination::IODParams;
//!
//! let params = IODParams::builder()
//!     .newton_max_it(30)
//!     .range_guess_km(800.0)
//!     .build()
//!     .unwrap();
//! println!("{params:#}");
//! ```

use hifitime::Epoch;
use nalgebra::{Matrix3, Vector3};
use std::cmp::Ordering::{Equal, Greater, Less};
use std::fmt;

use crate::constants::{time_unit, velocity_unit, DISTANCE_UNIT, MU_EARTH};
use crate::observations::Observation;
use crate::orbit_type::{OrbitalElementSet, StateVector};
use crate::tlefit_errors::TleFitError;

pub mod circular;
pub mod double_r;
pub mod gauss;
pub mod gauss_result;
pub mod gibbs;
pub mod gooding;
pub mod lambert;
pub mod laplace;
#[cfg(test)]
pub(crate) mod test_scenario;
pub mod windowed;

/// Configuration of the IOD solvers.
///
/// Distances are in **km**, angles in **degrees**; they are converted to canonical
/// units where the solvers need it.
#[derive(Debug, Clone, PartialEq)]
pub struct IODParams {
    // --- Gauss polynomial / root finding ---
    pub aberth_max_iter: u32,
    pub aberth_eps: f64,
    pub root_imag_eps: f64,
    pub max_tested_solutions: usize,

    // --- Physical plausibility ---
    pub r2_min_km: f64,
    pub r2_max_km: f64,
    pub min_rho2_km: f64,
    pub max_eccentricity: f64,
    pub min_direction_det: f64,

    // --- Velocity from three positions ---
    pub herrick_gibbs_max_angle_deg: f64,
    pub coplanarity_tol_deg: f64,

    // --- Gauss f/g refinement ---
    pub newton_eps: f64,
    pub newton_max_it: usize,

    // --- Range-iteration methods (Gooding, Double-R) ---
    pub range_max_iter: usize,
    pub range_tolerance: f64,
    pub range_guess_km: Option<f64>,

    // --- Laplace ---
    pub laplace_fit_degree: usize,
}

impl IODParams {
    /// Parameters with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validated builder starting from the defaults.
    pub fn builder() -> IODParamsBuilder {
        IODParamsBuilder::new()
    }
}

impl Default for IODParams {
    fn default() -> Self {
        IODParams {
            aberth_max_iter: 50,
            aberth_eps: 1.0e-6,
            root_imag_eps: 1.0e-6,
            max_tested_solutions: 3,

            // from the Earth's surface to well beyond GEO
            r2_min_km: 6_378.137,
            r2_max_km: 100_000.0,
            min_rho2_km: 1.0,
            max_eccentricity: 0.99,
            min_direction_det: 1.0e-12,

            herrick_gibbs_max_angle_deg: 1.0,
            coplanarity_tol_deg: 3.0,

            newton_eps: 1.0e-10,
            newton_max_it: 50,

            range_max_iter: 100,
            range_tolerance: 1.0e-9,
            range_guess_km: None,

            laplace_fit_degree: 4,
        }
    }
}

/// Fluent builder for [`IODParams`], validated by [`IODParamsBuilder::build`].
#[derive(Debug, Clone)]
pub struct IODParamsBuilder {
    params: IODParams,
}

impl Default for IODParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! setter {
    ($name:ident, $ty:ty) => {
        pub fn $name(mut self, v: $ty) -> Self {
            self.params.$name = v;
            self
        }
    };
}

impl IODParamsBuilder {
    pub fn new() -> Self {
        Self {
            params: IODParams::default(),
        }
    }

    setter!(aberth_max_iter, u32);
    setter!(aberth_eps, f64);
    setter!(root_imag_eps, f64);
    setter!(max_tested_solutions, usize);
    setter!(r2_min_km, f64);
    setter!(r2_max_km, f64);
    setter!(min_rho2_km, f64);
    setter!(max_eccentricity, f64);
    setter!(min_direction_det, f64);
    setter!(herrick_gibbs_max_angle_deg, f64);
    setter!(coplanarity_tol_deg, f64);
    setter!(newton_eps, f64);
    setter!(newton_max_it, usize);
    setter!(range_max_iter, usize);
    setter!(range_tolerance, f64);
    setter!(laplace_fit_degree, usize);

    pub fn range_guess_km(mut self, v: f64) -> Self {
        self.params.range_guess_km = Some(v);
        self
    }

    #[inline]
    fn gt0(x: f64) -> bool {
        x.partial_cmp(&0.0) == Some(Greater)
    }

    #[inline]
    fn ge0(x: f64) -> bool {
        matches!(x.partial_cmp(&0.0), Some(Greater) | Some(Equal))
    }

    #[inline]
    fn le(a: f64, b: f64) -> bool {
        matches!(a.partial_cmp(&b), Some(Less) | Some(Equal))
    }

    fn invalid(reason: &str) -> TleFitError {
        TleFitError::InvalidIODParameter(reason.into())
    }

    pub fn build(self) -> Result<IODParams, TleFitError> {
        let p = &self.params;

        if !Self::ge0(p.root_imag_eps) || !Self::ge0(p.min_direction_det) {
            return Err(Self::invalid(
                "root_imag_eps and min_direction_det must be >= 0",
            ));
        }
        if !Self::gt0(p.aberth_eps) || !Self::gt0(p.newton_eps) || !Self::gt0(p.range_tolerance)
        {
            return Err(Self::invalid(
                "aberth_eps, newton_eps and range_tolerance must be > 0",
            ));
        }
        if !Self::gt0(p.min_rho2_km) {
            return Err(Self::invalid("min_rho2_km must be > 0"));
        }
        if !(Self::gt0(p.max_eccentricity) && p.max_eccentricity < 1.0) {
            return Err(Self::invalid("max_eccentricity must lie in (0, 1)"));
        }
        if !(Self::gt0(p.herrick_gibbs_max_angle_deg) && Self::gt0(p.coplanarity_tol_deg)) {
            return Err(Self::invalid(
                "herrick_gibbs_max_angle_deg and coplanarity_tol_deg must be > 0",
            ));
        }
        if p.aberth_max_iter == 0 || p.newton_max_it == 0 || p.range_max_iter == 0 {
            return Err(Self::invalid("iteration caps must be >= 1"));
        }
        if p.max_tested_solutions < 1 {
            return Err(Self::invalid("max_tested_solutions must be >= 1"));
        }
        if p.laplace_fit_degree < 2 {
            return Err(Self::invalid("laplace_fit_degree must be >= 2"));
        }
        if let Some(guess) = p.range_guess_km {
            if !Self::gt0(guess) {
                return Err(Self::invalid("range_guess_km must be > 0"));
            }
        }
        if !(Self::gt0(p.r2_min_km) && Self::gt0(p.r2_max_km) && Self::le(p.r2_min_km, p.r2_max_km))
        {
            return Err(Self::invalid("require 0 < r2_min_km <= r2_max_km"));
        }

        Ok(self.params)
    }
}

impl fmt::Display for IODParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            const PARAM_COL: usize = 50;
            writeln!(f, "Initial Orbit Determination Parameters")?;
            writeln!(f, "-------------------------------------")?;

            macro_rules! line {
                ($fmt:expr, $val:expr, $comment:expr) => {{
                    let s = format!($fmt, $val);
                    let pad = if s.len() < PARAM_COL {
                        " ".repeat(PARAM_COL - s.len())
                    } else {
                        " ".to_string()
                    };
                    writeln!(f, "  {}{}# {}", s, pad, $comment)
                }};
            }

            writeln!(f, "[Gauss polynomial]")?;
            line!("aberth_max_iter       = {}", self.aberth_max_iter, "Max Aberth iterations")?;
            line!("aberth_eps            = {:.1e}", self.aberth_eps, "Aberth convergence tolerance")?;
            line!("root_imag_eps         = {:.1e}", self.root_imag_eps, "Max imaginary part of a real root")?;
            line!("max_tested_solutions  = {}", self.max_tested_solutions, "Max Gauss solutions kept")?;

            writeln!(f, "\n[Physical plausibility]")?;
            line!("r2_min_km             = {:.1} km", self.r2_min_km, "Minimum geocentric distance")?;
            line!("r2_max_km             = {:.1} km", self.r2_max_km, "Maximum geocentric distance")?;
            line!("min_rho2_km           = {:.3} km", self.min_rho2_km, "Minimum slant range")?;
            line!("max_eccentricity      = {:.3}", self.max_eccentricity, "Maximum eccentricity accepted")?;
            line!("min_direction_det     = {:.1e}", self.min_direction_det, "Minimum |det| of line-of-sight matrix")?;

            writeln!(f, "\n[Velocity from positions]")?;
            line!("herrick_gibbs_max_deg = {:.3}°", self.herrick_gibbs_max_angle_deg, "Herrick-Gibbs below this separation")?;
            line!("coplanarity_tol_deg   = {:.3}°", self.coplanarity_tol_deg, "Gibbs coplanarity tolerance")?;

            writeln!(f, "\n[Iterations]")?;
            line!("newton_eps            = {:.1e}", self.newton_eps, "Gauss refinement tolerance")?;
            line!("newton_max_it         = {}", self.newton_max_it, "Gauss refinement cap")?;
            line!("range_max_iter        = {}", self.range_max_iter, "Gooding / Double-R cap")?;
            line!("range_tolerance       = {:.1e}", self.range_tolerance, "Gooding / Double-R tolerance")?;
            match self.range_guess_km {
                Some(g) => line!("range_guess_km        = {:.1} km", g, "Initial range guess")?,
                None => line!("range_guess_km        = {}", "auto", "Initial range guess")?,
            }
            line!("laplace_fit_degree    = {}", self.laplace_fit_degree, "Max multi-Laplace polynomial degree")?;

            Ok(())
        } else {
            write!(
                f,
                "IODParams(r2∈[{:.0},{:.0}]km, e<{:.2}, newton_max_it={}, range_max_iter={}, hg<{:.1}°)",
                self.r2_min_km,
                self.r2_max_km,
                self.max_eccentricity,
                self.newton_max_it,
                self.range_max_iter,
                self.herrick_gibbs_max_angle_deg,
            )
        }
    }
}

/// Common contract of the IOD methods.
pub trait IodSolver {
    /// Short, stable method name used in logs.
    fn name(&self) -> &'static str;

    /// Minimum number of observations accepted by [`IodSolver::solve_state`].
    fn min_observations(&self) -> usize {
        3
    }

    /// Geocentric state (km, km/s) at the solver's reference epoch.
    fn solve_state(
        &self,
        observations: &[Observation],
        params: &IODParams,
    ) -> Result<StateVector, TleFitError>;

    /// Osculating element set of the determined orbit.
    fn solve(
        &self,
        observations: &[Observation],
        params: &IODParams,
    ) -> Result<OrbitalElementSet, TleFitError> {
        let state = self.solve_state(observations, params)?;
        let elements = OrbitalElementSet::from_state_vector(&state, MU_EARTH)?;
        if elements.eccentricity > params.max_eccentricity {
            return Err(crate::tlefit_errors::IodFailureKind::UnboundOrbit {
                eccentricity: elements.eccentricity,
            }
            .into());
        }
        Ok(elements)
    }
}

/// Selection of an IOD method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IodMethod {
    #[default]
    Gauss,
    Laplace,
    MultiLaplace,
    Gooding,
    DoubleR,
    Circular,
}

impl IodMethod {
    /// Every available method.
    pub const ALL: [IodMethod; 6] = [
        IodMethod::Gauss,
        IodMethod::Laplace,
        IodMethod::MultiLaplace,
        IodMethod::Gooding,
        IodMethod::DoubleR,
        IodMethod::Circular,
    ];

    fn solver(&self) -> &'static dyn IodSolver {
        match self {
            IodMethod::Gauss => &gauss::GaussSolver,
            IodMethod::Laplace => &laplace::LaplaceSolver,
            IodMethod::MultiLaplace => &laplace::MultiLaplaceSolver,
            IodMethod::Gooding => &gooding::GoodingSolver,
            IodMethod::DoubleR => &double_r::DoubleRSolver,
            IodMethod::Circular => &circular::CircularSolver,
        }
    }
}

impl IodSolver for IodMethod {
    fn name(&self) -> &'static str {
        self.solver().name()
    }

    fn min_observations(&self) -> usize {
        self.solver().min_observations()
    }

    fn solve_state(
        &self,
        observations: &[Observation],
        params: &IODParams,
    ) -> Result<StateVector, TleFitError> {
        self.solver().solve_state(observations, params)
    }

    fn solve(
        &self,
        observations: &[Observation],
        params: &IODParams,
    ) -> Result<OrbitalElementSet, TleFitError> {
        self.solver().solve(observations, params)
    }
}

impl fmt::Display for IodMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Three observations expressed in canonical units around the middle epoch.
///
/// `time` holds `t_i − t_2` in canonical time units, `observer` the observer
/// positions (columns) in Earth radii, `los` the unit lines of sight (columns).
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CanonicalTriplet {
    pub reference_epoch: Epoch,
    pub time: Vector3<f64>,
    pub los: Matrix3<f64>,
    pub observer: Matrix3<f64>,
}

impl CanonicalTriplet {
    pub fn from_observations(observations: &[Observation]) -> Result<Self, TleFitError> {
        crate::observations::check_batch(observations, 3)?;
        let obs = &observations[..3];
        let reference_epoch = obs[1].timestamp;
        let tu = time_unit();
        let dt = |o: &Observation| crate::time::seconds_between(reference_epoch, o.timestamp) / tu;

        Ok(CanonicalTriplet {
            reference_epoch,
            time: Vector3::new(dt(&obs[0]), 0.0, dt(&obs[2])),
            los: Matrix3::from_columns(&[
                obs[0].line_of_sight(),
                obs[1].line_of_sight(),
                obs[2].line_of_sight(),
            ]),
            observer: Matrix3::from_columns(&[
                obs[0].observer_position / DISTANCE_UNIT,
                obs[1].observer_position / DISTANCE_UNIT,
                obs[2].observer_position / DISTANCE_UNIT,
            ]),
        })
    }

    /// Geocentric position (canonical) of observation `i` at slant range `rho`.
    pub fn position(&self, i: usize, rho: f64) -> Vector3<f64> {
        self.observer.column(i) + rho * self.los.column(i)
    }
}

/// State in canonical units (DU, DU/TU) → km, km/s.
pub(crate) fn state_from_canonical(
    epoch: Epoch,
    position: &Vector3<f64>,
    velocity: &Vector3<f64>,
) -> StateVector {
    StateVector::new(
        epoch,
        position * DISTANCE_UNIT,
        velocity * velocity_unit(),
    )
}

/// Starting slant range (canonical) for the range-iteration methods.
///
/// Order of preference: the configured guess, the circular-orbit approximation,
/// then the range to a 500 km altitude shell.
pub(crate) fn initial_range_guess(
    triplet: &CanonicalTriplet,
    observations: &[Observation],
    params: &IODParams,
    index: usize,
) -> f64 {
    if let Some(guess) = params.range_guess_km {
        return guess / DISTANCE_UNIT;
    }
    if let Ok(fit) = circular::circular_fit(observations) {
        let rho = fit.ranges_km[index] / DISTANCE_UNIT;
        if rho.is_finite() && rho > 0.0 {
            return rho;
        }
    }
    let shell = (crate::constants::EARTH_MAJOR_AXIS + 500.0) / DISTANCE_UNIT;
    range_to_sphere(&triplet.observer.column(index).into_owned(), &triplet.los.column(index).into_owned(), shell)
        .unwrap_or(shell - 1.0)
}

/// Positive slant range from `observer` along unit `los` to the sphere of radius `radius`.
pub(crate) fn range_to_sphere(
    observer: &Vector3<f64>,
    los: &Vector3<f64>,
    radius: f64,
) -> Option<f64> {
    // |R + ρL|² = r²  ⇒  ρ² + 2(L·R)ρ + R² − r² = 0
    let b = los.dot(observer);
    let disc = b * b - (observer.norm_squared() - radius * radius);
    if disc < 0.0 {
        return None;
    }
    let rho = -b + disc.sqrt();
    (rho > 0.0).then_some(rho)
}
