//! # Gauss method for initial orbit determination
//!
//! Classical angles-only IOD from three lines of sight acquired by one or several
//! sensors, with a known observer position at each epoch.
//!
//! ## Core structure: [`GaussObs`]
//!
//! [`GaussObs`] stores the triplet: indices of the observations, RA/Dec in radians,
//! epochs (seconds from the middle observation) and observer positions (km).
//!
//! ## Algorithm outline
//!
//! 1. Build the matrix `S` of unit lines of sight; reject it when `|det S|` is below
//!    [`IODParams::min_direction_det`] (coplanar or repeated directions).
//! 2. Form the sparse degree-8 polynomial `r⁸ + c6·r⁶ + c3·r³ + c0 = 0` for the
//!    middle geocentric distance, prefiltered with Descartes' rule of signs and
//!    solved with the Aberth–Ehrlich method.
//! 3. For every admissible root recover the three slant ranges and positions,
//!    then the middle velocity with Gibbs / Herrick-Gibbs.
//! 4. Refine with exact universal-variable f and g coefficients until the positions
//!    stop moving ([`GaussObs::pos_and_vel_correction`]).
//! 5. Keep corrected solutions first, then the lowest eccentricity.
//!
//! The computation runs in canonical Earth units
//! (see [`crate::constants::time_unit`]), so `µ = 1` throughout.
//!
//! ## Monte Carlo perturbations
//!
//! [`GaussObs::realizations_iter`] yields the nominal triplet followed by copies with
//! Gaussian noise added to RA/Dec, for uncertainty studies.
//!
//! ## References
//!
//! * Milani & Gronchi (2010), *Theory of Orbit Determination*
//! * Vallado (2013), *Fundamentals of Astrodynamics and Applications*, §7.3

use std::ops::ControlFlow;

use aberth::{aberth, StopReason};
use hifitime::Epoch;
use log::debug;
use nalgebra::{Matrix3, Vector3};
use rand::Rng;
use rand_distr::StandardNormal;
use smallvec::SmallVec;

use crate::constants::{time_unit, Radian, Seconds, DISTANCE_UNIT, RADEG};
use crate::initial_orbit_determination::gauss_result::{GaussResult, GaussSolution};
use crate::initial_orbit_determination::gibbs::velocity_from_positions;
use crate::initial_orbit_determination::{state_from_canonical, IODParams, IodSolver};
use crate::kepler::{eccentricity_vector, lagrange_coefficients};
use crate::observations::{check_chronological, Observation};
use crate::orbit_type::StateVector;
use crate::time::seconds_between;
use crate::tlefit_errors::{IodFailureKind, TleFitError};

/// Observation triplet for the Gauss method.
///
/// Fields
/// -----------------
/// * `idx_obs`: indices of the three observations in the caller's batch.
/// * `ra`, `dec`: topocentric angles in radians.
/// * `time`: epochs in seconds relative to `reference_epoch` (the middle observation).
/// * `observer_position`: observer positions in km, one column per observation.
#[derive(Debug, PartialEq, Clone)]
pub struct GaussObs {
    pub(crate) idx_obs: Vector3<usize>,
    pub(crate) ra: Vector3<Radian>,
    pub(crate) dec: Vector3<Radian>,
    pub(crate) time: Vector3<Seconds>,
    pub(crate) observer_position: Matrix3<f64>,
    pub(crate) reference_epoch: Epoch,
}

/// Geometry shared by every root of one triplet, canonical units.
#[derive(Debug, Clone)]
pub struct GaussPrelim {
    pub tau1: f64,
    pub tau3: f64,
    pub unit_matrix: Matrix3<f64>,
    pub inv_unit_matrix: Matrix3<f64>,
    pub vector_a: Vector3<f64>,
    pub vector_b: Vector3<f64>,
    pub observer: Matrix3<f64>,
}

/// Candidate positions (columns, canonical) with ranges and middle velocity.
type Candidate = (Matrix3<f64>, Vector3<f64>, Vector3<f64>);

/// Descartes' sign-variation upper bound on the positive roots of
/// `c0 + c3·x³ + c6·x⁶ + x⁸`.
///
/// A result of `0` guarantees there is no positive root, so Aberth can be skipped.
/// Coefficients with `|c| ≤ zero_eps` are ignored.
#[inline]
pub(crate) fn descartes_upper_bound_deg8_sparse(c0: f64, c3: f64, c6: f64, zero_eps: f64) -> u32 {
    #[inline]
    fn s(v: f64, eps: f64) -> i8 {
        if v.abs() <= eps {
            0
        } else if v.is_sign_positive() {
            1
        } else {
            -1
        }
    }
    let seq = [1_i8, s(c6, zero_eps), s(c3, zero_eps), s(c0, zero_eps)];

    let mut last = 0_i8;
    let mut count = 0_u32;
    for &cur in &seq {
        if cur == 0 {
            continue;
        }
        if last != 0 && cur != last {
            count += 1;
        }
        last = cur;
    }
    count
}

impl GaussObs {
    /// Build a triplet from explicit values.
    ///
    /// Arguments
    /// -----------------
    /// * `idx_obs`: indices of the observations.
    /// * `ra`, `dec`: angles in radians.
    /// * `time`: seconds relative to `reference_epoch`.
    /// * `observer_position`: `3×3` matrix of observer positions in km (columns).
    /// * `reference_epoch`: epoch of the middle observation.
    pub fn with_observer_position(
        idx_obs: Vector3<usize>,
        ra: Vector3<Radian>,
        dec: Vector3<Radian>,
        time: Vector3<Seconds>,
        observer_position: Matrix3<f64>,
        reference_epoch: Epoch,
    ) -> GaussObs {
        GaussObs {
            idx_obs,
            ra,
            dec,
            time,
            observer_position,
            reference_epoch,
        }
    }

    /// Build the triplet `idx` out of a batch of observations.
    ///
    /// Errors
    /// ----------
    /// * [`IodFailureKind::NotEnoughObservations`] if an index is out of range.
    /// * [`IodFailureKind::NotChronological`] if the three epochs are not increasing.
    pub fn from_observations(
        observations: &[Observation],
        idx: [usize; 3],
    ) -> Result<GaussObs, TleFitError> {
        let max_idx = idx.iter().copied().max().unwrap_or(0);
        if max_idx >= observations.len() {
            return Err(IodFailureKind::NotEnoughObservations {
                expected: max_idx + 1,
                got: observations.len(),
            }
            .into());
        }
        let [o1, o2, o3] = idx.map(|i| &observations[i]);
        check_chronological(&[o1.clone(), o2.clone(), o3.clone()])?;

        let reference_epoch = o2.timestamp;
        Ok(GaussObs::with_observer_position(
            Vector3::new(idx[0], idx[1], idx[2]),
            Vector3::new(o1.ra, o2.ra, o3.ra) * RADEG,
            Vector3::new(o1.dec, o2.dec, o3.dec) * RADEG,
            Vector3::new(
                seconds_between(reference_epoch, o1.timestamp),
                0.0,
                seconds_between(reference_epoch, o3.timestamp),
            ),
            Matrix3::from_columns(&[
                o1.observer_position,
                o2.observer_position,
                o3.observer_position,
            ]),
            reference_epoch,
        ))
    }

    /// Epoch of the middle observation, where the state is determined.
    pub fn reference_epoch(&self) -> Epoch {
        self.reference_epoch
    }

    /// Indices of the three observations.
    pub fn indices(&self) -> [usize; 3] {
        [self.idx_obs.x, self.idx_obs.y, self.idx_obs.z]
    }

    /// Lazy sequence of noisy triplets: the nominal triplet first, then
    /// `n_realizations` copies with `N(0, σ·noise_scale)` added to each angle.
    ///
    /// Arguments
    /// -----------------
    /// * `errors_ra`, `errors_dec`: 1-σ uncertainties in radians.
    /// * `n_realizations`: number of noisy copies.
    /// * `noise_scale`: multiplier applied to the uncertainties.
    /// * `rng`: source of standard normal draws.
    pub fn realizations_iter<'a, R: Rng + 'a>(
        &'a self,
        errors_ra: &'a Vector3<f64>,
        errors_dec: &'a Vector3<f64>,
        n_realizations: usize,
        noise_scale: f64,
        rng: &'a mut R,
    ) -> impl Iterator<Item = GaussObs> + 'a {
        let s_ra = *errors_ra * noise_scale;
        let s_dec = *errors_dec * noise_scale;

        // 0 → nominal, 1..=n → noisy copies
        let mut i = 0usize;

        std::iter::from_fn(move || {
            if i == 0 {
                i += 1;
                return Some(self.clone());
            }
            if i > n_realizations {
                return None;
            }
            i += 1;

            let mut draw = || -> f64 { rng.sample(StandardNormal) };
            let ra = Vector3::new(
                self.ra.x + draw() * s_ra.x,
                self.ra.y + draw() * s_ra.y,
                self.ra.z + draw() * s_ra.z,
            );
            let dec = Vector3::new(
                self.dec.x + draw() * s_dec.x,
                self.dec.y + draw() * s_dec.y,
                self.dec.z + draw() * s_dec.z,
            );

            Some(GaussObs {
                ra,
                dec,
                ..self.clone()
            })
        })
    }

    /// Eager version of [`GaussObs::realizations_iter`].
    pub fn generate_noisy_realizations(
        &self,
        errors_ra: &Vector3<f64>,
        errors_dec: &Vector3<f64>,
        n_realizations: usize,
        noise_scale: f64,
        rng: &mut impl Rng,
    ) -> Vec<GaussObs> {
        self.realizations_iter(errors_ra, errors_dec, n_realizations, noise_scale, rng)
            .collect()
    }

    fn unit_vector(ra: f64, dec: f64) -> Vector3<f64> {
        let cos_dec = dec.cos();
        Vector3::new(ra.cos() * cos_dec, ra.sin() * cos_dec, dec.sin())
    }

    /// Matrix whose columns are the three unit lines of sight.
    fn unit_matrix(&self) -> Matrix3<f64> {
        Matrix3::from_columns(&[
            GaussObs::unit_vector(self.ra[0], self.dec[0]),
            GaussObs::unit_vector(self.ra[1], self.dec[1]),
            GaussObs::unit_vector(self.ra[2], self.dec[2]),
        ])
    }

    /// Time intervals, direction matrix and its inverse, and the `a`, `b` vectors.
    ///
    /// `τ1 = (t1 − t2)/TU`, `τ3 = (t3 − t2)/TU`, `a = (τ3/τ13, −1, −τ1/τ13)` and
    /// `b = (a1(τ13² − τ3²)/6, 0, a3(τ13² − τ1²)/6)`.
    ///
    /// Errors
    /// ----------
    /// * [`IodFailureKind::NotChronological`] for repeated epochs.
    /// * [`IodFailureKind::SingularDirectionMatrix`] when `|det S| < min_direction_det`.
    pub fn gauss_prelim(&self, params: &IODParams) -> Result<GaussPrelim, TleFitError> {
        let tu = time_unit();
        let tau1 = (self.time[0] - self.time[1]) / tu;
        let tau3 = (self.time[2] - self.time[1]) / tu;
        if !(tau1 < 0.0 && tau3 > 0.0) {
            return Err(IodFailureKind::NotChronological.into());
        }
        let tau13 = tau3 - tau1;
        let vector_a = Vector3::new(tau3 / tau13, -1.0, -(tau1 / tau13));
        let vector_b = Vector3::new(
            vector_a[0] * (tau13.powi(2) - tau3.powi(2)) / 6.0,
            0.0,
            vector_a[2] * (tau13.powi(2) - tau1.powi(2)) / 6.0,
        );

        let unit_matrix = self.unit_matrix();
        let det = unit_matrix.determinant();
        if !det.is_finite() || det.abs() < params.min_direction_det {
            debug!("direction matrix rejected, det = {det:.3e}");
            return Err(IodFailureKind::SingularDirectionMatrix.into());
        }
        let inv_unit_matrix = unit_matrix
            .try_inverse()
            .ok_or(IodFailureKind::SingularDirectionMatrix)?;

        Ok(GaussPrelim {
            tau1,
            tau3,
            unit_matrix,
            inv_unit_matrix,
            vector_a,
            vector_b,
            observer: self.observer_position / DISTANCE_UNIT,
        })
    }

    /// Coefficients `(c6, c3, c0)` of `r⁸ + c6·r⁶ + c3·r³ + c0`.
    ///
    /// With `a2* = (S⁻¹)₂·(R a)`, `b2* = (S⁻¹)₂·(R b)`, `R2` the middle observer
    /// position and `s2` the middle line of sight:
    /// `c6 = −(a2*² + R2² + 2 a2* s2·R2)`, `c3 = −2 b2* (a2* + s2·R2)`, `c0 = −b2*²`.
    pub fn coeff_eight_poly(&self, prelim: &GaussPrelim) -> (f64, f64, f64) {
        let ra = prelim.observer * prelim.vector_a;
        let rb = prelim.observer * prelim.vector_b;

        let second_row_t = prelim.inv_unit_matrix.row(1).transpose();
        let a2star = second_row_t.dot(&ra);
        let b2star = second_row_t.dot(&rb);

        let observer_mid = prelim.observer.column(1);
        let r22 = observer_mid.norm_squared();
        let s2r2 = prelim.unit_matrix.column(1).dot(&observer_mid);

        (
            -(a2star.powi(2)) - r22 - (2.0 * a2star * s2r2),
            -(2.0 * b2star * (a2star + s2r2)),
            -(b2star.powi(2)),
        )
    }

    /// Real positive roots of the degree-8 polynomial `polynom` (ascending order).
    pub fn solve_8poly(
        &self,
        polynom: &[f64; 9],
        max_iterations: u32,
        aberth_epsilon: f64,
        root_acceptance_epsilon: f64,
    ) -> Result<Vec<f64>, TleFitError> {
        let mut roots = Vec::new();
        Self::visit_real_positive_roots(
            polynom,
            max_iterations,
            aberth_epsilon,
            root_acceptance_epsilon,
            |r| {
                roots.push(r);
                ControlFlow::Continue(())
            },
        )?;
        Ok(roots)
    }

    #[inline]
    pub(crate) fn visit_real_positive_roots(
        poly: &[f64; 9],
        max_iterations: u32,
        aberth_epsilon: f64,
        root_imag_eps: f64,
        mut on_root: impl FnMut(f64) -> ControlFlow<(), ()>,
    ) -> Result<(), TleFitError> {
        let roots = aberth(poly, max_iterations, aberth_epsilon);

        match roots.stop_reason {
            StopReason::Converged(_) | StopReason::MaxIteration(_) => {
                for z in roots.iter() {
                    if z.re > 0.0 && z.im.abs() < root_imag_eps {
                        if let ControlFlow::Break(()) = on_root(z.re) {
                            break;
                        }
                    }
                }
                Ok(())
            }
            StopReason::Failed(_) => Err(IodFailureKind::PolynomialRootFindingFailed.into()),
        }
    }

    /// Slant ranges `ρ = −(S⁻¹ R c) ./ c` and geocentric positions (canonical).
    ///
    /// Errors
    /// ----------
    /// * [`IodFailureKind::SpuriousRootDetected`] when a range is negative or
    ///   `ρ2` is below `min_rho2_km`.
    pub fn position_vectors(
        &self,
        params: &IODParams,
        prelim: &GaussPrelim,
        vector_c: &Vector3<f64>,
    ) -> Result<(Matrix3<f64>, Vector3<f64>), TleFitError> {
        let gcap = prelim.observer * vector_c;
        let crhom = prelim.inv_unit_matrix * gcap;
        let rho: Vector3<f64> = -crhom.component_div(vector_c);

        if rho[1] < params.min_rho2_km / DISTANCE_UNIT || rho[0] <= 0.0 || rho[2] <= 0.0 {
            return Err(IodFailureKind::SpuriousRootDetected.into());
        }

        let rho_unit = Matrix3::from_columns(&[
            rho[0] * prelim.unit_matrix.column(0),
            rho[1] * prelim.unit_matrix.column(1),
            rho[2] * prelim.unit_matrix.column(2),
        ]);
        Ok((prelim.observer + rho_unit, rho))
    }

    /// Turn a root `r2` into positions, ranges and the Gibbs / Herrick-Gibbs velocity.
    ///
    /// Returns `Ok(None)` for a root that leads to an inadmissible orbit, and an
    /// error for a degenerate velocity geometry.
    pub fn accept_root(
        &self,
        params: &IODParams,
        prelim: &GaussPrelim,
        root: f64,
    ) -> Result<Option<Candidate>, TleFitError> {
        let r2m3 = 1.0 / root.powi(3);
        let vector_c = Vector3::new(
            prelim.vector_a[0] + prelim.vector_b[0] * r2m3,
            -1.0,
            prelim.vector_a[2] + prelim.vector_b[2] * r2m3,
        );

        let (positions, rho) = match self.position_vectors(params, prelim, &vector_c) {
            Ok(v) => v,
            Err(e) => {
                debug!("root r2 = {root:.6} DU rejected: {e}");
                return Ok(None);
            }
        };

        let r1 = positions.column(0).into_owned();
        let r2 = positions.column(1).into_owned();
        let r3 = positions.column(2).into_owned();
        let velocity = velocity_from_positions(
            [&r1, &r2, &r3],
            [prelim.tau1, 0.0, prelim.tau3],
            1.0,
            params,
        )?;

        let ecc = eccentricity_vector(&r2, &velocity, 1.0).norm();
        if !(ecc < params.max_eccentricity) {
            debug!("root r2 = {root:.6} DU rejected: eccentricity {ecc:.4}");
            return Ok(None);
        }
        Ok(Some((positions, rho, velocity)))
    }

    /// Refine a candidate with exact f and g coefficients.
    ///
    /// Each pass propagates the middle state to `τ1` and `τ3`, forms
    /// `c = (g3/F, −1, −g1/F)` with `F = f1·g3 − f3·g1`, recovers new ranges and
    /// positions, and averages the two velocity estimates `(r_i − f_i r2)/g_i`.
    /// Iteration stops when the relative position update falls below
    /// `params.newton_eps`.
    ///
    /// Errors
    /// ----------
    /// * [`IodFailureKind::NoConvergence`] after `params.newton_max_it` passes.
    /// * [`IodFailureKind::IllConditioned`] for a vanishing `F`.
    /// * [`IodFailureKind::UnboundOrbit`] if the iteration leaves the bound domain.
    pub fn pos_and_vel_correction(
        &self,
        params: &IODParams,
        prelim: &GaussPrelim,
        candidate: &Candidate,
    ) -> Result<Candidate, TleFitError> {
        let (mut pos, mut rho, mut vel) = *candidate;
        let (tau1, tau3) = (prelim.tau1, prelim.tau3);

        for iteration in 0..params.newton_max_it {
            let r1 = pos.column(0).into_owned();
            let r2 = pos.column(1).into_owned();
            let r3 = pos.column(2).into_owned();

            let left = lagrange_coefficients(&r2, &vel, tau1, 1.0)?;
            let right = lagrange_coefficients(&r2, &vel, tau3, 1.0)?;
            if left.g.abs() <= f64::EPSILON || right.g.abs() <= f64::EPSILON {
                return Err(IodFailureKind::IllConditioned("vanishing g coefficient").into());
            }

            let v_left = (r1 - left.f * r2) / left.g;
            let v_right = (r3 - right.f * r2) / right.g;
            let new_vel = (v_left + v_right) * 0.5;

            let fl = left.f * right.g - right.f * left.g;
            if !fl.is_finite() || fl.abs() < f64::EPSILON {
                return Err(IodFailureKind::IllConditioned("f1·g3 − f3·g1 vanishes").into());
            }
            let c_vec = Vector3::new(right.g / fl, -1.0, -left.g / fl);

            let (new_pos, new_rho) = self.position_vectors(params, prelim, &c_vec)?;

            let r_mid = new_pos.column(1).into_owned();
            let ecc = eccentricity_vector(&r_mid, &new_vel, 1.0).norm();
            if !(ecc < params.max_eccentricity) {
                return Err(IodFailureKind::UnboundOrbit { eccentricity: ecc }.into());
            }

            let rel_err = (new_pos - pos).norm() / new_pos.norm();
            pos = new_pos;
            rho = new_rho;
            vel = new_vel;

            if rel_err <= params.newton_eps {
                debug!("f/g refinement converged after {} passes", iteration + 1);
                return Ok((pos, rho, vel));
            }
        }

        Err(IodFailureKind::NoConvergence {
            method: "gauss f/g refinement",
            iterations: params.newton_max_it,
        }
        .into())
    }

    fn build_solution(&self, candidate: &Candidate) -> GaussSolution {
        let (pos, rho, vel) = candidate;
        let r2 = pos.column(1).into_owned();
        GaussSolution {
            state: state_from_canonical(self.reference_epoch, &r2, vel),
            ranges_km: rho * DISTANCE_UNIT,
        }
    }

    /// Every admissible Gauss solution (at most `params.max_tested_solutions`).
    ///
    /// Errors
    /// ----------
    /// * [`IodFailureKind::SingularDirectionMatrix`] for a degenerate triplet.
    /// * [`IodFailureKind::NoRootsFound`] when no root yields an acceptable orbit.
    /// * [`IodFailureKind::PolynomialRootFindingFailed`] if Aberth fails.
    pub fn prelim_orbit_all(&self, params: &IODParams) -> Result<Vec<GaussResult>, TleFitError> {
        let prelim = self.gauss_prelim(params)?;

        let (c6, c3, c0) = self.coeff_eight_poly(&prelim);
        let poly = [c0, 0.0, 0.0, c3, 0.0, 0.0, c6, 0.0, 1.0];

        if descartes_upper_bound_deg8_sparse(c0, c3, c6, 0.0) == 0 {
            return Err(IodFailureKind::NoRootsFound.into());
        }

        let r2_min = params.r2_min_km / DISTANCE_UNIT;
        let r2_max = params.r2_max_km / DISTANCE_UNIT;
        let mut solutions: SmallVec<[GaussResult; 4]> = SmallVec::new();
        let mut last_error: Option<TleFitError> = None;

        Self::visit_real_positive_roots(
            &poly,
            params.aberth_max_iter,
            params.aberth_eps,
            params.root_imag_eps,
            |r2| {
                if !(r2_min..=r2_max).contains(&r2) {
                    debug!("root r2 = {r2:.6} DU outside the admissible shell");
                    return ControlFlow::Continue(());
                }

                match self.accept_root(params, &prelim, r2) {
                    Ok(Some(candidate)) => {
                        let result = match self.pos_and_vel_correction(params, &prelim, &candidate)
                        {
                            Ok(corrected) => {
                                GaussResult::CorrectedOrbit(self.build_solution(&corrected))
                            }
                            Err(e) => {
                                debug!("keeping preliminary orbit for r2 = {r2:.6} DU: {e}");
                                GaussResult::PrelimOrbit(self.build_solution(&candidate))
                            }
                        };
                        solutions.push(result);
                    }
                    Ok(None) => {}
                    Err(e) => last_error = Some(e),
                }

                if solutions.len() >= params.max_tested_solutions {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            },
        )?;

        if solutions.is_empty() {
            Err(last_error.unwrap_or(IodFailureKind::NoRootsFound.into()))
        } else {
            Ok(solutions.into_vec())
        }
    }

    /// Best Gauss solution: corrected orbits first, then the lowest eccentricity.
    pub fn prelim_orbit(&self, params: &IODParams) -> Result<GaussResult, TleFitError> {
        let all = self.prelim_orbit_all(params)?;
        let eccentricity = |r: &GaussResult| {
            let s = r.solution();
            eccentricity_vector(
                &s.state.position,
                &s.state.velocity,
                crate::constants::MU_EARTH,
            )
            .norm()
        };

        all.into_iter()
            .min_by(|a, b| {
                b.is_corrected()
                    .cmp(&a.is_corrected())
                    .then(eccentricity(a).total_cmp(&eccentricity(b)))
            })
            .ok_or(IodFailureKind::NoRootsFound.into())
    }
}

/// Gauss method on the first three observations.
#[derive(Debug, Clone, Copy, Default)]
pub struct GaussSolver;

impl GaussSolver {
    /// Full Gauss result (stage and ranges) for the first three observations.
    pub fn solve_triplet(
        &self,
        observations: &[Observation],
        params: &IODParams,
    ) -> Result<GaussResult, TleFitError> {
        crate::observations::check_batch(observations, 3)?;
        GaussObs::from_observations(observations, [0, 1, 2])?.prelim_orbit(params)
    }
}

impl IodSolver for GaussSolver {
    fn name(&self) -> &'static str {
        "gauss"
    }

    fn solve_state(
        &self,
        observations: &[Observation],
        params: &IODParams,
    ) -> Result<StateVector, TleFitError> {
        Ok(self.solve_triplet(observations, params)?.into_inner().state)
    }
}
