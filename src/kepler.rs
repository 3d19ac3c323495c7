//! # Two-body propagation with universal variables
//!
//! Closed-form Keplerian propagation used by the IOD refinement loops
//! (Gauss f/g correction, Gooding, Double-R) and by element conversions.
//!
//! The universal Kepler equation is written with the Stumpff-like functions
//! `s0..s3` of the universal anomaly `ψ`:
//!
//! ```text
//! r0·s1(ψ) + σ0·s2(ψ) + µ·s3(ψ) = Δt,      σ0 = r0·v0,   α = v0² − 2µ/r0
//! ```
//!
//! It covers elliptic (`α < 0`) and hyperbolic (`α > 0`) motion with a single
//! Newton iteration. Every function takes `µ` explicitly so the same code runs in
//! canonical units (`µ = 1`) and in km/s.

use nalgebra::Vector3;
use std::f64::consts::PI;

use crate::constants::DPI;
use crate::tlefit_errors::IodFailureKind;

/// Universal functions `s0, s1, s2, s3` evaluated at `(ψ, α)`.
///
/// Small `|αψ²|` uses the power series directly; large values halve `ψ` until
/// the series is accurate, then rebuild `s0, s1` with the duplication formulas.
pub(crate) fn s_funct(psi: f64, alpha: f64) -> (f64, f64, f64, f64) {
    const JMAX: usize = 70;
    const HALFMAX: usize = 30;
    const BETACONTR: f64 = 100.0;

    let contr = 100.0 * f64::EPSILON;
    let overfl = 1.0 / f64::EPSILON;
    let beta = alpha * psi * psi;

    let series_step = |term: &mut f64, sum: &mut f64, denom: &dyn Fn(f64) -> f64| {
        for j in 1..=JMAX {
            *term *= beta / denom(j as f64);
            *sum += *term;
            if term.abs() < contr || term.abs() > overfl {
                break;
            }
        }
    };

    if beta.abs() < BETACONTR {
        let mut term2 = psi * psi / 2.0;
        let mut term3 = term2 * psi / 3.0;
        let mut s2 = term2;
        let mut s3 = term3;

        series_step(&mut term2, &mut s2, &|j| (2.0 * j + 1.0) * (2.0 * j + 2.0));
        series_step(&mut term3, &mut s3, &|j| (2.0 * j + 2.0) * (2.0 * j + 3.0));

        (1.0 + alpha * s2, psi + alpha * s3, s2, s3)
    } else {
        let mut psi_half = psi;
        let mut nhalf = 0;
        for _ in 0..HALFMAX {
            psi_half *= 0.5;
            nhalf += 1;
            if (alpha * psi_half * psi_half).abs() < BETACONTR {
                break;
            }
        }

        let beta = alpha * psi_half * psi_half;
        let mut term0 = 1.0;
        let mut term1 = psi_half;
        let mut s0 = 1.0;
        let mut s1 = psi_half;
        for j in 1..=JMAX {
            term0 *= beta / ((2 * j - 1) as f64 * (2 * j) as f64);
            s0 += term0;
            if term0.abs() < contr || term0.abs() > overfl {
                break;
            }
        }
        for j in 1..=JMAX {
            term1 *= beta / ((2 * j) as f64 * (2 * j + 1) as f64);
            s1 += term1;
            if term1.abs() < contr || term1.abs() > overfl {
                break;
            }
        }

        for _ in 0..nhalf {
            let s0_double = 2.0 * s0 * s0 - 1.0;
            let s1_double = 2.0 * s0 * s1;
            s0 = s0_double;
            s1 = s1_double;
        }

        (s0, s1, (s0 - 1.0) / alpha, (s1 - psi) / alpha)
    }
}

/// Principal value of an angle in `[0, 2π)`.
#[inline]
pub(crate) fn principal_angle(a: f64) -> f64 {
    a.rem_euclid(DPI)
}

/// Signed difference `a − b` reduced to `[-π, π]`.
pub(crate) fn angle_diff(a: f64, b: f64) -> f64 {
    let diff = principal_angle(a) - principal_angle(b);
    if diff > PI {
        diff - DPI
    } else if diff < -PI {
        diff + DPI
    } else {
        diff
    }
}

/// Newton solution of Kepler's equation `M = E − e·sin E` for `0 ≤ e < 1`.
///
/// The result is continuous in `M` (not reduced to `[0, 2π)`), so the number of
/// elapsed revolutions is preserved.
pub fn solve_kepler(mean_anomaly: f64, eccentricity: f64) -> Result<f64, IodFailureKind> {
    const MAX_ITER: usize = 50;
    if !(0.0..1.0).contains(&eccentricity) {
        return Err(IodFailureKind::UnboundOrbit { eccentricity });
    }

    let mut ecc_anomaly = if eccentricity < 0.8 {
        mean_anomaly
    } else {
        mean_anomaly + eccentricity * mean_anomaly.sin().signum()
    };

    for _ in 0..MAX_ITER {
        let f = ecc_anomaly - eccentricity * ecc_anomaly.sin() - mean_anomaly;
        let fp = 1.0 - eccentricity * ecc_anomaly.cos();
        let delta = f / fp;
        ecc_anomaly -= delta;
        if delta.abs() < 1e-14 * (1.0 + ecc_anomaly.abs()) {
            return Ok(ecc_anomaly);
        }
    }
    Err(IodFailureKind::KeplerFailure)
}

/// Eccentric anomaly from true anomaly (elliptic case), in `(-π, π]`.
pub fn true_to_eccentric_anomaly(true_anomaly: f64, eccentricity: f64) -> f64 {
    let half = 0.5 * true_anomaly;
    2.0 * ((1.0 - eccentricity).sqrt() * half.sin())
        .atan2((1.0 + eccentricity).sqrt() * half.cos())
}

/// True anomaly from eccentric anomaly (elliptic case), in `(-π, π]`.
pub fn eccentric_to_true_anomaly(ecc_anomaly: f64, eccentricity: f64) -> f64 {
    let half = 0.5 * ecc_anomaly;
    2.0 * ((1.0 + eccentricity).sqrt() * half.sin())
        .atan2((1.0 - eccentricity).sqrt() * half.cos())
}

/// Mean anomaly (radians, `[0, 2π)`) from true anomaly.
pub fn true_to_mean_anomaly(true_anomaly: f64, eccentricity: f64) -> f64 {
    let ecc_anomaly = true_to_eccentric_anomaly(true_anomaly, eccentricity);
    principal_angle(ecc_anomaly - eccentricity * ecc_anomaly.sin())
}

/// True anomaly (radians, `[0, 2π)`) from mean anomaly.
pub fn mean_to_true_anomaly(mean_anomaly: f64, eccentricity: f64) -> Result<f64, IodFailureKind> {
    let ecc_anomaly = solve_kepler(mean_anomaly, eccentricity)?;
    Ok(principal_angle(eccentric_to_true_anomaly(
        ecc_anomaly,
        eccentricity,
    )))
}

/// Starting guess for the universal anomaly from the classical anomalies.
fn prelim_kepuni(dt: f64, r0: f64, sig0: f64, mu: f64, alpha: f64, e0: f64) -> Option<f64> {
    const ITX: usize = 20;
    let contr = 100.0 * f64::EPSILON;

    if alpha < 0.0 {
        let a0 = -mu / alpha;
        let enne = (-alpha).powi(3).sqrt() / mu;

        let (u0, ell0) = if e0 < contr {
            (0.0, 0.0)
        } else {
            let cosu0 = ((1.0 - r0 / a0) / e0).clamp(-1.0, 1.0);
            let u0 = if sig0 < 0.0 {
                principal_angle(-cosu0.acos())
            } else {
                cosu0.acos()
            };
            (u0, u0 - e0 * u0.sin())
        };

        let ell = ell0 + enne * dt;
        let u = if e0 < contr {
            ell
        } else {
            solve_kepler(ell, e0.min(1.0 - contr)).ok()?
        };
        Some((u - u0) / (-alpha).sqrt())
    } else if alpha > 0.0 {
        let a0 = -mu / alpha;
        let enne = alpha.powi(3).sqrt() / mu;
        let coshf0 = (1.0 - r0 / a0) / e0;
        let mut f0 = if coshf0 > 1.0 {
            (coshf0 + (coshf0 * coshf0 - 1.0).sqrt()).ln()
        } else {
            0.0
        };
        if sig0 < 0.0 {
            f0 = -f0;
        }

        let ell = e0 * f0.sinh() - f0 + enne * dt;
        let mut f: f64 = 0.0;
        for _ in 0..ITX {
            if f.abs() < 15.0 {
                let df = -(e0 * f.sinh() - f - ell) / (e0 * f.cosh() - 1.0);
                let ff = f + df;
                f = if f * ff < 0.0 { f / 2.0 } else { ff };
            } else {
                f /= 2.0;
            }
            if f.abs() < contr * 1e3 {
                break;
            }
        }
        Some((f - f0) / alpha.sqrt())
    } else {
        None
    }
}

/// Universal anomaly and its universal functions after a Newton solve.
#[derive(Debug, Clone, Copy)]
pub(crate) struct UniversalAnomaly {
    pub psi: f64,
    pub s0: f64,
    pub s1: f64,
    pub s2: f64,
    pub s3: f64,
}

/// Solve the universal Kepler equation for the anomaly reached after `dt`.
///
/// Arguments
/// -----------------
/// * `dt`: propagation interval.
/// * `r0`: initial radius.
/// * `sig0`: `r0·v0`.
/// * `mu`: gravitational parameter.
/// * `alpha`: twice the specific energy, `v0² − 2µ/r0`.
/// * `e0`: eccentricity, only used to seed the iteration.
pub(crate) fn solve_kepuni(
    dt: f64,
    r0: f64,
    sig0: f64,
    mu: f64,
    alpha: f64,
    e0: f64,
) -> Option<UniversalAnomaly> {
    const JMAX: usize = 100;
    let contr = 100.0 * f64::EPSILON;

    let mut psi = prelim_kepuni(dt, r0, sig0, mu, alpha, e0)?;

    for _ in 0..JMAX {
        let (s0, s1, s2, s3) = s_funct(psi, alpha);

        let fun = r0 * s1 + sig0 * s2 + mu * s3 - dt;
        let funp = r0 * s0 + sig0 * s1 + mu * s2;
        let dpsi = -fun / funp;

        if s3.abs() > 1e-2 / f64::EPSILON || !dpsi.is_finite() {
            return None;
        }

        let psi1 = psi + dpsi;
        psi = if psi1 * psi < 0.0 { psi / 2.0 } else { psi1 };

        if dpsi.abs() < contr || dpsi.abs() < contr * 10.0 * psi.abs() {
            return Some(UniversalAnomaly {
                psi,
                s0,
                s1,
                s2,
                s3,
            });
        }
    }

    None
}

/// Lagrange coefficients mapping `(r0, v0)` to `(r, v)` after `dt`:
/// `r = f·r0 + g·v0`, `v = ḟ·r0 + ġ·v0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LagrangeCoefficients {
    pub f: f64,
    pub g: f64,
    pub fdot: f64,
    pub gdot: f64,
}

/// Exact Lagrange coefficients of two-body motion over `dt`.
///
/// Errors
/// ----------
/// * [`IodFailureKind::KeplerFailure`] when the universal Kepler equation does
///   not converge or the state is parabolic to machine precision.
pub fn lagrange_coefficients(
    r0: &Vector3<f64>,
    v0: &Vector3<f64>,
    dt: f64,
    mu: f64,
) -> Result<LagrangeCoefficients, IodFailureKind> {
    if dt == 0.0 {
        return Ok(LagrangeCoefficients {
            f: 1.0,
            g: 0.0,
            fdot: 0.0,
            gdot: 1.0,
        });
    }

    let r0_norm = r0.norm();
    let sig0 = r0.dot(v0);
    let alpha = v0.norm_squared() - 2.0 * mu / r0_norm;
    let e0 = eccentricity_vector(r0, v0, mu).norm();

    let ua = solve_kepuni(dt, r0_norm, sig0, mu, alpha, e0).ok_or(IodFailureKind::KeplerFailure)?;

    let r = r0_norm * ua.s0 + sig0 * ua.s1 + mu * ua.s2;
    if !(r.is_finite() && r > 0.0) {
        return Err(IodFailureKind::KeplerFailure);
    }

    Ok(LagrangeCoefficients {
        f: 1.0 - mu * ua.s2 / r0_norm,
        g: dt - mu * ua.s3,
        fdot: -mu * ua.s1 / (r0_norm * r),
        gdot: 1.0 - mu * ua.s2 / r,
    })
}

/// Propagate a state vector over `dt` under two-body motion.
pub fn propagate(
    r0: &Vector3<f64>,
    v0: &Vector3<f64>,
    dt: f64,
    mu: f64,
) -> Result<(Vector3<f64>, Vector3<f64>), IodFailureKind> {
    let lc = lagrange_coefficients(r0, v0, dt, mu)?;
    Ok((lc.f * r0 + lc.g * v0, lc.fdot * r0 + lc.gdot * v0))
}

/// Eccentricity vector `((v² − µ/r)·r − (r·v)·v) / µ`.
pub(crate) fn eccentricity_vector(r: &Vector3<f64>, v: &Vector3<f64>, mu: f64) -> Vector3<f64> {
    ((v.norm_squared() - mu / r.norm()) * r - r.dot(v) * v) / mu
}

#[cfg(test)]
mod kepler_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_s_funct() {
        let psi = -15.279808141051223;
        let alpha = -1.6298946008705195e-4;

        let (s0, s1, s2, s3) = s_funct(psi, alpha);

        assert_relative_eq!(s0, 0.9810334785583247, epsilon = 1e-13);
        assert_relative_eq!(s1, -15.183083836892674, epsilon = 1e-12);
        assert_relative_eq!(s2, 116.3665517484714, epsilon = 1e-10);
        assert_relative_eq!(s3, -593.4390119881925, epsilon = 1e-9);
    }

    #[test]
    fn test_s_funct_duplication_branch() {
        // large |αψ²| goes through the halving branch; compare with closed forms
        let alpha: f64 = -1.0;
        let psi: f64 = 12.0;
        let (s0, s1, s2, s3) = s_funct(psi, alpha);
        assert_relative_eq!(s0, psi.cos(), epsilon = 1e-9);
        assert_relative_eq!(s1, psi.sin(), epsilon = 1e-9);
        assert_relative_eq!(s2, 1.0 - psi.cos(), epsilon = 1e-9);
        assert_relative_eq!(s3, psi - psi.sin(), epsilon = 1e-9);
    }

    #[test]
    fn test_solve_kepuni() {
        let dt = -20.765849999996135;
        let r0 = 1.3803870211345761;
        let sig0 = 3.7013544840038748E-003;
        let mu = 2.9591220828559115E-004;
        let alpha = -1.6421583777711407E-004;
        let e0 = 0.28359959913734450;

        let ua = solve_kepuni(dt, r0, sig0, mu, alpha, e0).unwrap();
        assert_relative_eq!(ua.psi, -15.327414893041839, epsilon = 1e-10);
        assert_relative_eq!(ua.s0, 0.9807723505583343, epsilon = 1e-10);
        assert_relative_eq!(ua.s3, -598.9874390519309, epsilon = 1e-7);

        let alpha = 1.6421583777711407E-004;
        let ua = solve_kepuni(dt, r0, sig0, mu, alpha, e0).unwrap();
        assert_relative_eq!(ua.psi, -15.1324122746124, epsilon = 1e-10);
        assert_relative_eq!(ua.s2, 114.854187452308, epsilon = 1e-8);

        assert!(solve_kepuni(dt, r0, sig0, mu, 0.0, e0).is_none());
    }

    #[test]
    fn circular_orbit_quarter_period() {
        let mu = 1.0;
        let r0 = Vector3::new(1.0, 0.0, 0.0);
        let v0 = Vector3::new(0.0, 1.0, 0.0);
        let (r, v) = propagate(&r0, &v0, 0.5 * PI, mu).unwrap();
        assert_relative_eq!(r, Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-10);
        assert_relative_eq!(v, Vector3::new(-1.0, 0.0, 0.0), epsilon = 1e-10);
    }

    #[test]
    fn propagation_conserves_integrals_and_reverses() {
        let mu = crate::constants::MU_EARTH;
        let r0 = Vector3::new(-6045.0, -3490.0, 2500.0);
        let v0 = Vector3::new(-3.457, 6.618, 2.533);
        let energy = |r: &Vector3<f64>, v: &Vector3<f64>| 0.5 * v.norm_squared() - mu / r.norm();

        for dt in [30.0, 600.0, 5400.0, 20_000.0] {
            let (r, v) = propagate(&r0, &v0, dt, mu).unwrap();
            assert_relative_eq!(energy(&r, &v), energy(&r0, &v0), max_relative = 1e-9);
            assert_relative_eq!(r.cross(&v), r0.cross(&v0), max_relative = 1e-9);

            let (rb, vb) = propagate(&r, &v, -dt, mu).unwrap();
            assert_relative_eq!(rb, r0, epsilon = 1e-5);
            assert_relative_eq!(vb, v0, epsilon = 1e-8);
        }
    }

    #[test]
    fn hyperbolic_propagation_conserves_energy() {
        let mu = 1.0;
        let r0 = Vector3::new(1.0, 0.0, 0.0);
        let v0 = Vector3::new(0.0, 1.6, 0.2);
        let (r, v) = propagate(&r0, &v0, 3.0, mu).unwrap();
        let e = |r: &Vector3<f64>, v: &Vector3<f64>| 0.5 * v.norm_squared() - mu / r.norm();
        assert_relative_eq!(e(&r, &v), e(&r0, &v0), epsilon = 1e-10);
    }

    #[test]
    fn kepler_equation_and_anomalies() {
        for e in [0.0, 0.1, 0.5, 0.9, 0.99] {
            for m in [0.1, 1.0, 3.0, 5.5, 12.0] {
                let big_e = solve_kepler(m, e).unwrap();
                assert_relative_eq!(big_e - e * big_e.sin(), m, epsilon = 1e-12);
            }
            let nu = 2.3;
            let m = true_to_mean_anomaly(nu, e);
            assert_relative_eq!(mean_to_true_anomaly(m, e).unwrap(), nu, epsilon = 1e-10);
        }
        assert!(solve_kepler(1.0, 1.2).is_err());
    }

    #[test]
    fn test_angle_diff() {
        assert_relative_eq!(angle_diff(0.1, DPI - 0.1), 0.2, epsilon = 1e-12);
        assert_relative_eq!(angle_diff(DPI - 0.1, 0.1), -0.2, epsilon = 1e-12);
        assert_relative_eq!(principal_angle(-0.5), DPI - 0.5, epsilon = 1e-12);
    }
}
