//! Orbit determination of an ISS pass simulated with SGP4.
//!
//!   RUST_LOG=info cargo run --example iss_pass

use std::error::Error;

use tlefit::constants::RADEG;
use tlefit::conversion::{decimal_to_dms, decimal_to_hms, wrap_deg_180};
use tlefit::observations::Observation;
use tlefit::observers::GroundStation;
use tlefit::residuals::ResidualSummary;
use tlefit::time::{add_seconds, gmst_at, parse_utc};
use tlefit::tle::propagator::Sgp4Propagator;
use tlefit::tle::TleHeader;
use tlefit::{IodMethod, OrbitPipeline};

const ISS_LINE1: &str = "1 25544U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2927";
const ISS_LINE2: &str = "2 25544  51.6416 247.4627 0006703 130.5360 325.0288 15.72125391563537";

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let sgp4 = Sgp4Propagator::from_lines(ISS_LINE1, ISS_LINE2)?;
    let epoch = parse_utc("2008-09-20T12:25:40.104192")?;

    // station a few degrees off the ground track
    let (r0, _) = sgp4.state_at(epoch)?;
    let lat = (r0.z / r0.norm()).asin() / RADEG;
    let lon = (r0.y.atan2(r0.x) - gmst_at(epoch)) / RADEG;
    let station = GroundStation::new(lat - 3.0, wrap_deg_180(lon + 2.0), 100.0, Some("demo".into()))?;

    let mut observations = Vec::new();
    for k in -3..=3 {
        let t = add_seconds(epoch, 30.0 * k as f64);
        let (r, _) = sgp4.state_at(t)?;
        let observer = station.eci_position(t);
        observations.push(Observation::from_line_of_sight(t, &(r - observer), observer)?);
    }

    println!(
        "Observations from lat {:.3}°, lon {:.3}°",
        station.latitude, station.longitude
    );
    for obs in &observations {
        println!(
            "  {}  RA {}  Dec {}",
            obs.timestamp,
            decimal_to_hms(obs.ra, 2),
            decimal_to_dms(obs.dec, 1)
        );
    }

    let header = TleHeader::new(25544)
        .with_international_designator("98067A")
        .with_element_set_number(292);

    for method in [IodMethod::Gauss, IodMethod::Gooding, IodMethod::DoubleR] {
        let solution = OrbitPipeline::default()
            .with_method(method)
            .with_header(header.clone())
            .run(&observations)?;

        println!("\n[{method}]");
        println!("{}", solution.tle);
        if let Some(windows) = solution.windows_used {
            println!("  windows averaged : {windows}");
        }
        if let Some(err) = solution.sgp4_position_error_km {
            println!("  SGP4 miss at epoch: {:.3} m", err * 1e3);
        }

        let samples = solution.residuals(&observations)?;
        if let Some(summary) = ResidualSummary::from_samples(&samples) {
            println!(
                "  residuals (deg)  : RMS RA {:.5}  RMS Dec {:.5}  max RA {:.5}  max Dec {:.5}",
                summary.rms_ra_deg, summary.rms_dec_deg, summary.max_abs_ra_deg, summary.max_abs_dec_deg
            );
        }
    }

    println!("\nReference:\n{ISS_LINE1}\n{ISS_LINE2}");
    Ok(())
}
