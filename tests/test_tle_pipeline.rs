mod common;

use approx::assert_relative_eq;
use tlefit::observations::csv_reader::read_observations_from_reader;
use tlefit::orbit_type::StateVector;
use tlefit::residuals::{evaluate_residuals, ResidualSummary};
use tlefit::tle::fit::fit_mean_elements;
use tlefit::tle::propagator::Sgp4Propagator;
use tlefit::tle::{verify_line, Classification, TleHeader};
use tlefit::{IODParams, IodMethod, OrbitPipeline, TleFitError};

use crate::common::{
    init_logger, iss_epoch, iss_observations, sgp4_observations, Scenario, ISS_LINE1, ISS_LINE2,
};

fn iss_header() -> TleHeader {
    TleHeader::new(25544)
        .with_international_designator("98067A")
        .with_element_set_number(292)
        .with_revolution_number(56353)
}

#[test]
fn published_iss_lines() {
    assert!(verify_line(ISS_LINE1));
    assert!(verify_line(ISS_LINE2));

    let sgp4 = Sgp4Propagator::from_lines(ISS_LINE1, ISS_LINE2).unwrap();
    let (r, v) = sgp4.state_at(iss_epoch()).unwrap();
    assert!(r.norm() > 6_700.0 && r.norm() < 6_800.0, "|r| = {}", r.norm());
    assert!(v.norm() > 7.5 && v.norm() < 7.8, "|v| = {}", v.norm());

    let corrupted = ISS_LINE2.replace("51.6416", "51.6417");
    assert!(matches!(
        Sgp4Propagator::from_lines(ISS_LINE1, &corrupted),
        Err(TleFitError::InvalidTle(_))
    ));
}

#[test]
fn mean_element_fit_regenerates_the_iss_lines() {
    init_logger();
    let sgp4 = Sgp4Propagator::from_lines(ISS_LINE1, ISS_LINE2).unwrap();
    let (r, v) = sgp4.state_at(iss_epoch()).unwrap();

    let header = iss_header().with_drag(-0.00002182, 0.0, -0.000011606);
    let fit = fit_mean_elements(&StateVector::new(iss_epoch(), r, v), &header).unwrap();
    assert!(fit.position_error_km < 0.05, "{} km", fit.position_error_km);

    let tle = &fit.record;
    assert_eq!(&tle.line1()[..32], &ISS_LINE1[..32]);
    assert_eq!(&tle.line1()[33..61], &ISS_LINE1[33..61]);
    assert_relative_eq!(tle.inclination_deg(), 51.6416, epsilon = 1e-3);
    assert_relative_eq!(tle.raan_deg(), 247.4627, epsilon = 1e-3);
    assert_relative_eq!(tle.eccentricity(), 0.0006703, epsilon = 2e-6);
    assert_relative_eq!(tle.mean_motion_rev_per_day(), 15.72125391, epsilon = 1e-4);
}

#[test]
fn iss_pass_through_the_pipeline() {
    init_logger();
    let (_, observations) = iss_observations(&[-60.0, 0.0, 60.0, 120.0]);

    let params = IODParams::builder().max_eccentricity(0.1).build().unwrap();
    let solution = OrbitPipeline::default()
        .with_header(iss_header())
        .with_params(params)
        .run(&observations)
        .unwrap();
    assert_eq!(solution.method, IodMethod::Gauss);
    assert_eq!(solution.windows_used, Some(2));
    assert!(solution.sgp4_position_error_km.unwrap() < 0.1);

    let tle = &solution.tle;
    assert!(verify_line(&tle.line1()));
    assert!(verify_line(&tle.line2()));
    assert_eq!(&tle.line1()[..18], "1 25544U 98067A   ");
    assert_eq!(&tle.line2()[..7], "2 25544");
    assert!((tle.mean_motion_rev_per_day() - 15.72125391).abs() < 0.1);
    assert!((tle.inclination_deg() - 51.6416).abs() < 0.1);

    let samples = solution.residuals(&observations).unwrap();
    let summary = ResidualSummary::from_samples(&samples).unwrap();
    assert_eq!(summary.count, observations.len());
    assert!(summary.rms_ra_deg < 0.2, "{summary:?}");
    assert!(summary.rms_dec_deg < 0.2, "{summary:?}");
}

#[test]
fn three_observation_tle_predicts_a_held_out_one() {
    init_logger();
    let (_, observations) = iss_observations(&[-60.0, 0.0, 60.0, 120.0]);
    let (solved, held_out) = observations.split_at(3);

    let params = IODParams::builder().max_eccentricity(0.1).build().unwrap();
    let solution = OrbitPipeline::default()
        .with_header(TleHeader::new(25544))
        .with_params(params)
        .run(solved)
        .unwrap();
    assert_eq!(solution.windows_used, None);
    assert_eq!(solution.tle.norad_id(), 25544);
    assert_eq!(&solution.tle.line1()[..9], "1 25544U ");

    let samples = evaluate_residuals(&solution.tle, held_out).unwrap();
    assert_eq!(samples.len(), 1);
    let sample = samples[0];
    assert_eq!(sample.timestamp, held_out[0].timestamp);
    assert!(sample.delta_ra_deg.abs() < 0.5, "{sample:?}");
    assert!(sample.delta_dec_deg.abs() < 0.5, "{sample:?}");
}

#[test]
fn gauss_on_a_circular_sgp4_orbit_reproduces_the_line_of_sight() {
    init_logger();
    let scenario = Scenario::leo();
    let header = TleHeader::new(90_002);
    let (truth, observations) = sgp4_observations(&scenario, &header, &[-60.0, 0.0, 60.0, 120.0]);
    assert_eq!(truth.eccentricity(), 0.0);

    let params = IODParams::builder().max_eccentricity(0.1).build().unwrap();
    let solution = OrbitPipeline::default()
        .with_header(header)
        .with_params(params)
        .run(&observations[..3])
        .unwrap();
    assert!(solution.elements.eccentricity < 0.01, "{:?}", solution.elements);
    assert!((solution.tle.mean_motion_rev_per_day() - truth.mean_motion_rev_per_day()).abs() < 0.05);

    let samples = solution.residuals(&observations).unwrap();
    let summary = ResidualSummary::from_samples(&samples).unwrap();
    assert_eq!(summary.count, 4);
    assert!(summary.max_abs_ra_deg < 0.1, "{summary:?}");
    assert!(summary.max_abs_dec_deg < 0.1, "{summary:?}");
}

#[test]
fn observations_read_from_csv() {
    let (_, observations) = iss_observations(&[-60.0, 0.0, 60.0]);
    let mut table = String::from("timestamp,ra_deg,dec_deg,observer_x_km,observer_y_km,observer_z_km,range_km\n");
    for o in &observations {
        let p = o.observer_position;
        table.push_str(&format!(
            "{},{:.10},{:.10},{:.6},{:.6},{:.6},\n",
            o.timestamp, o.ra, o.dec, p.x, p.y, p.z
        ));
    }
    let read = read_observations_from_reader(table.as_bytes()).unwrap();
    assert_eq!(read.len(), 3);
    assert_eq!(read[1].timestamp, observations[1].timestamp);
    assert!(read.iter().all(|o| o.range.is_none()));

    let solution = OrbitPipeline::default()
        .with_method(IodMethod::Gooding)
        .with_header(TleHeader::new(90_001).with_classification(Classification::Secret))
        .with_sgp4_fit(false)
        .run(&read)
        .unwrap();
    assert_eq!(solution.windows_used, None);
    assert_eq!(solution.sgp4_position_error_km, None);
    assert_eq!(&solution.tle.line1()[..8], "1 90001S");
    assert!((solution.elements.semi_major_axis_km - 6_730.0).abs() < 50.0);
}

#[test]
fn unrenderable_header_is_a_format_error() {
    let (_, observations) = iss_observations(&[-60.0, 0.0, 60.0]);
    let err = OrbitPipeline::default()
        .with_header(TleHeader::new(123_456))
        .run(&observations)
        .unwrap_err();
    assert!(matches!(err, TleFitError::FormatError(_)));
    assert!(!err.is_skippable());
}
