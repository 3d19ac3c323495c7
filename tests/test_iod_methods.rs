mod common;

use approx::assert_relative_eq;
use tlefit::initial_orbit_determination::circular::circular_fit;
use tlefit::initial_orbit_determination::{IODParams, IodMethod, IodSolver};
use tlefit::tlefit_errors::{IodFailureKind, TleFitError};

use crate::common::{init_logger, Scenario};

/// Observation spacing and accuracy on `a` each method reaches on exact data.
fn spacing_and_tolerance(method: IodMethod) -> (f64, f64) {
    match method {
        IodMethod::Laplace | IodMethod::MultiLaplace => (2.0, 0.05 * 6_771.0),
        _ => (60.0, 0.1),
    }
}

#[test]
fn every_method_on_a_circular_leo() {
    init_logger();
    let scenario = Scenario::leo();
    for method in IodMethod::ALL {
        let (spacing, tolerance) = spacing_and_tolerance(method);
        let obs = scenario.observations(&[-spacing, 0.0, spacing, 2.0 * spacing]);
        let elements = method
            .solve(&obs, &IODParams::default())
            .unwrap_or_else(|e| panic!("{method}: {e}"));
        assert!(
            (elements.semi_major_axis_km - 6_771.0).abs() < tolerance,
            "{method}: a = {}",
            elements.semi_major_axis_km
        );
    }
}

#[test]
fn range_methods_on_an_eccentric_orbit() {
    init_logger();
    let scenario = Scenario::eccentric();
    let obs = scenario.observations(&[-60.0, 0.0, 60.0]);
    for method in [IodMethod::Gauss, IodMethod::Gooding, IodMethod::DoubleR] {
        let state = method.solve_state(&obs, &IODParams::default()).unwrap();
        let truth = scenario.truth(state.epoch);
        assert!(
            (state.position - truth.position).norm() < 1e-2,
            "{method}: {}",
            (state.position - truth.position).norm()
        );
        assert!((state.velocity - truth.velocity).norm() < 1e-5, "{method}");
    }
}

#[test]
fn circular_approximation_on_an_eccentric_orbit() {
    // a 3 % eccentricity offsets the fitted radius by at most a·e
    let scenario = Scenario::eccentric();
    let obs = scenario.observations(&[-60.0, 0.0, 60.0]);
    let fit = circular_fit(&obs).unwrap();
    let r2 = scenario.truth(obs[1].timestamp).position.norm();
    assert!((fit.radius_km - r2).abs() < 7_200.0 * 0.03, "{} vs {r2}", fit.radius_km);
    assert_eq!(fit.ranges_km.len(), 3);
}

#[test]
fn short_batches_are_rejected_per_method() {
    let obs = Scenario::leo().observations(&[0.0, 60.0]);
    for method in IodMethod::ALL {
        let result = method.solve(&obs, &IODParams::default());
        if method.min_observations() <= 2 {
            assert!(result.is_ok(), "{method}");
        } else {
            assert_eq!(
                result.unwrap_err(),
                TleFitError::IodFailure(IodFailureKind::NotEnoughObservations {
                    expected: 3,
                    got: 2
                }),
                "{method}"
            );
        }
    }
}

#[test]
fn iteration_caps_surface_as_no_convergence() {
    let obs = Scenario::leo().observations(&[-60.0, 0.0, 60.0]);
    let params = IODParams::builder()
        .range_guess_km(2_000.0)
        .range_max_iter(1)
        .range_tolerance(1e-300)
        .build()
        .unwrap();
    for method in [IodMethod::Gooding, IodMethod::DoubleR] {
        match method.solve_state(&obs, &params) {
            Err(TleFitError::IodFailure(IodFailureKind::NoConvergence { iterations, .. })) => {
                assert_eq!(iterations, 1)
            }
            other => panic!("{method}: {other:?}"),
        }
    }
}

#[test]
fn method_names_are_stable() {
    let names: Vec<String> = IodMethod::ALL.iter().map(|m| m.to_string()).collect();
    assert_eq!(
        names,
        ["gauss", "laplace", "multi-laplace", "gooding", "double-r", "circular"]
    );
    assert_eq!(IodMethod::default(), IodMethod::Gauss);
    assert_relative_eq!(IODParams::default().r2_min_km, 6_378.137);
}
