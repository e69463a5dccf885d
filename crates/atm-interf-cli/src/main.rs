//! Interferometric Atmospheric Delay CLI
//!
//! Evaluates delays and height corrections over an elevation sweep with one
//! of the atmospheric adapters and writes the result as JSON.
//!
//! Usage:
//!   atm-interf --height 10 --e-start 5 --e-end 30 insitu --pressure 101325 --temperature 288.15
//!   atm-interf --options '{"h_hybrid": true}' standard --lat 48.2 --lon 16.4 --version 2w
//!   atm-interf standard --lat 48.2 --lon 16.4 --grid-dir ./grids

use anyhow::{bail, Context, Result};
use atm_interf::adapters::{
    gpt_adapter, insitu_adapter, polynomial_adapter, GptQuery, InSituMeteo, InSituOptions, PolynomialOptions,
};
use atm_interf::bending::BendingForm;
use atm_interf::climatology::{ClimatologyVersion, GridFiles, StandardAtmosphere};
use atm_interf::{
    compute_delay_and_height, AtmInput, GeodeticPosition, InterfOptions, InterfSolution, RefractivityCoeffs,
};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use ndarray::Array1;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "atm-interf",
    about = "Interferometric atmospheric delay and altimetry corrections for GNSS-R"
)]
struct Args {
    /// First elevation of the sweep (deg)
    #[arg(long, default_value_t = 5.0)]
    e_start: f64,

    /// Last elevation of the sweep (deg)
    #[arg(long, default_value_t = 30.0)]
    e_end: f64,

    /// Elevation step (deg)
    #[arg(long, default_value_t = 0.5)]
    e_step: f64,

    /// Reflector height below the antenna (m)
    #[arg(short = 'H', long, default_value_t = 10.0)]
    height: f64,

    /// Engine options as JSON, overlaid on the defaults
    #[arg(long)]
    options: Option<String>,

    /// Output JSON file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Constant atmospheric state supplied directly
    Generic {
        /// Refractivity n − 1
        #[arg(long, default_value_t = 2.5e-4)]
        refractivity: f64,

        /// Elevation bending (deg)
        #[arg(long, default_value_t = 0.0)]
        bending: f64,

        /// Bending rate d(de)/de; derived numerically when omitted
        #[arg(long)]
        bending_rate: Option<f64>,
    },
    /// Polynomial refractivity profile
    Polynomial {
        /// Antenna height above the ellipsoid (m)
        #[arg(long, default_value_t = 0.0)]
        antenna_height: f64,

        /// Model options as JSON, overlaid on the defaults
        #[arg(long)]
        model: Option<String>,
    },
    /// Meteorology measured at the antenna
    Insitu {
        /// Pressure (Pa)
        #[arg(long, default_value_t = 101_325.0)]
        pressure: f64,

        /// Temperature (K)
        #[arg(long, default_value_t = 288.15)]
        temperature: f64,

        /// Specific humidity (kg/kg)
        #[arg(long, default_value_t = 0.0)]
        humidity: f64,

        /// Use antenna conditions for the whole layer
        #[arg(long)]
        thin_layer: bool,

        /// Refractivity coefficient set
        #[arg(long, default_value = "thayer1974")]
        coefficients: RefractivityCoeffs,

        /// Bending correction form (bennet or bowditch)
        #[arg(long, default_value = "bennet")]
        bending_form: BendingForm,
    },
    /// Climatology adapter over the standard atmosphere
    Standard {
        /// Antenna latitude (deg)
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Antenna longitude (deg)
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Antenna height above the ellipsoid (m)
        #[arg(long, default_value_t = 0.0)]
        antenna_height: f64,

        /// Epoch as RFC 3339 (now when omitted)
        #[arg(long)]
        date: Option<DateTime<Utc>>,

        /// Climatology version (1, 2 or 2w)
        #[arg(long, default_value = "2w")]
        version: ClimatologyVersion,

        /// Annual temperature amplitude (K)
        #[arg(long, default_value_t = 0.0)]
        annual_amplitude: f64,

        /// Directory holding the GPT grid files; checked before the run
        #[arg(long)]
        grid_dir: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct Report<'a> {
    adapter: &'a str,
    e: Vec<f64>,
    height: f64,
    solution: InterfSolution,
}

/// Elevations from `start` to `end` inclusive.
fn elevation_sweep(start: f64, end: f64, step: f64) -> Result<Array1<f64>> {
    if !(step > 0.0) {
        bail!("elevation step must be positive, got {}", step);
    }
    if end < start {
        bail!("elevation sweep is empty: {} > {}", start, end);
    }
    let count = ((end - start) / step + 1e-9).floor() as usize + 1;
    Ok(Array1::from_iter((0..count).map(|i| start + i as f64 * step)))
}

/// Defaults of `T`, overlaid with the fields present in `json`.
fn overlay<T: DeserializeOwned + Default>(json: Option<&str>, what: &str) -> Result<T> {
    match json {
        Some(json) => serde_json::from_str(json).with_context(|| format!("invalid {} JSON", what)),
        None => Ok(T::default()),
    }
}

fn run(args: &Args, e: &Array1<f64>, interf: &InterfOptions) -> Result<(&'static str, InterfSolution)> {
    let h = Array1::from_elem(1, args.height);

    let result = match &args.command {
        Command::Generic {
            refractivity,
            bending,
            bending_rate,
        } => {
            let mut input = AtmInput::new(
                e.clone(),
                h,
                Array1::from_elem(1, *refractivity),
                Array1::from_elem(1, *bending),
            );
            if let Some(der) = bending_rate {
                input = input.with_der(Array1::from_elem(1, *der));
            }
            ("generic", compute_delay_and_height(&input, interf)?)
        }
        Command::Polynomial { antenna_height, model } => {
            let options: PolynomialOptions = overlay(model.as_deref(), "model")?;
            ("polynomial", polynomial_adapter(e, &h, *antenna_height, &options, interf)?)
        }
        Command::Insitu {
            pressure,
            temperature,
            humidity,
            thin_layer,
            coefficients,
            bending_form,
        } => {
            let mut options = InSituOptions::default().thin_layer(*thin_layer);
            options.coefficients = *coefficients;
            options.bending.form = *bending_form;
            let meteo = InSituMeteo::uniform(*pressure, *temperature, *humidity);
            ("insitu", insitu_adapter(e, &h, &meteo, &options, interf)?)
        }
        Command::Standard {
            lat,
            lon,
            antenna_height,
            date,
            version,
            annual_amplitude,
            grid_dir,
        } => {
            if let Some(dir) = grid_dir {
                match GridFiles::new(dir).locate(*version)? {
                    Some(path) => info!("GPT{} grid file {}", version, path.display()),
                    None => info!("GPT{} needs no grid file", version),
                }
            }
            let atmosphere = StandardAtmosphere::default().with_annual_amplitude(*annual_amplitude);
            let query = GptQuery::new(
                GeodeticPosition::new(*lat, *lon, *antenna_height),
                date.unwrap_or_else(Utc::now),
                *version,
            );
            info!("Climatology GPT{} at {}", query.version, query.epoch.to_rfc3339());
            (
                "standard",
                gpt_adapter(&atmosphere, &query, e, args.height, &InSituOptions::default(), interf)?,
            )
        }
    };
    Ok(result)
}

fn write_report<W: Write>(writer: W, report: &Report) -> Result<()> {
    let mut writer = BufWriter::new(writer);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays valid JSON
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("{}", "=".repeat(60));
    info!("Interferometric Atmospheric Delay");
    info!("{}", "=".repeat(60));

    let e = elevation_sweep(args.e_start, args.e_end, args.e_step)?;
    let interf: InterfOptions = overlay(args.options.as_deref(), "engine options")?;
    info!(
        "{} elevations from {}° to {}°, H = {} m",
        e.len(),
        args.e_start,
        e[e.len() - 1],
        args.height
    );

    let (adapter, solution) = run(&args, &e, &interf)?;
    let nan_heights = solution.heights.ht.iter().filter(|x| x.is_nan()).count();
    info!("Adapter {}: {} NaN height corrections", adapter, nan_heights);

    let report = Report {
        adapter,
        e: e.to_vec(),
        height: args.height,
        solution,
    };
    match &args.output {
        Some(path) => {
            info!("Writing output to {:?}", path);
            let file = File::create(path).with_context(|| format!("cannot create {:?}", path))?;
            write_report(file, &report)?;
        }
        None => write_report(io::stdout().lock(), &report)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use atm_interf::AtmError;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_elevation_sweep_inclusive() {
        let e = elevation_sweep(5.0, 30.0, 0.5).unwrap();
        assert_eq!(e.len(), 51);
        assert_eq!(e[0], 5.0);
        assert!((e[50] - 30.0).abs() < 1e-12);
    }

    #[test]
    fn test_elevation_sweep_rejects_bad_step() {
        assert!(elevation_sweep(5.0, 30.0, 0.0).is_err());
        assert!(elevation_sweep(30.0, 5.0, 1.0).is_err());
    }

    #[test]
    fn test_overlay_engine_options() {
        let opts: InterfOptions = overlay(Some(r#"{"h_hybrid": true}"#), "engine options").unwrap();
        assert!(opts.h_hybrid);
        assert!(opts.numerical_noend);
        assert!(overlay::<InterfOptions>(Some("{not json"), "engine options").is_err());
    }

    #[test]
    fn test_run_generic() {
        let args = parse(&["atm-interf", "--e-start", "90", "--e-end", "90", "generic"]);
        let e = elevation_sweep(args.e_start, args.e_end, args.e_step).unwrap();
        let (adapter, sol) = run(&args, &e, &InterfOptions::default()).unwrap();
        assert_eq!(adapter, "generic");
        assert!((sol.delays.da[0] - 0.005).abs() < 1e-15);
    }

    #[test]
    fn test_run_insitu_parses_selectors() {
        let args = parse(&[
            "atm-interf",
            "insitu",
            "--humidity",
            "0.008",
            "--coefficients",
            "bevis1994",
            "--bending-form",
            "bowditch",
        ]);
        let e = elevation_sweep(args.e_start, args.e_end, args.e_step).unwrap();
        let (adapter, sol) = run(&args, &e, &InterfOptions::default()).unwrap();
        assert_eq!(adapter, "insitu");
        assert!(sol.heights.ht[1].is_finite());
    }

    #[test]
    fn test_unknown_climatology_version_rejected() {
        assert!(Args::try_parse_from(["atm-interf", "standard", "--lat", "0", "--lon", "0", "--version", "3"]).is_err());
    }

    #[test]
    fn test_standard_reports_missing_grid_file() {
        let dir = tempfile::tempdir().unwrap();
        let grid_dir = dir.path().to_str().unwrap();
        let args = parse(&["atm-interf", "standard", "--lat", "0", "--lon", "0", "--grid-dir", grid_dir]);
        let e = elevation_sweep(args.e_start, args.e_end, args.e_step).unwrap();

        let err = run(&args, &e, &InterfOptions::default()).unwrap_err();
        match err.downcast_ref::<AtmError>() {
            Some(AtmError::MissingExternalData { file, .. }) => assert!(file.ends_with("gpt2_1wA.grd")),
            other => panic!("unexpected error: {other:?}"),
        }

        std::fs::write(dir.path().join("gpt2_1wA.grd"), "").unwrap();
        let (adapter, _) = run(&args, &e, &InterfOptions::default()).unwrap();
        assert_eq!(adapter, "standard");

        // GPT1 is coefficient-only
        let args = parse(&[
            "atm-interf", "standard", "--lat", "0", "--lon", "0", "--version", "1", "--grid-dir", grid_dir,
        ]);
        std::fs::remove_file(dir.path().join("gpt2_1wA.grd")).unwrap();
        assert!(run(&args, &e, &InterfOptions::default()).is_ok());
    }

    #[test]
    fn test_run_standard_and_write_report() {
        let args = parse(&[
            "atm-interf",
            "standard",
            "--lat",
            "-33.9",
            "--lon",
            "18.4",
            "--date",
            "2023-06-01T00:00:00Z",
        ]);
        let e = elevation_sweep(args.e_start, args.e_end, args.e_step).unwrap();
        let (adapter, solution) = run(&args, &e, &InterfOptions::default()).unwrap();

        let file = tempfile::NamedTempFile::new().unwrap();
        let report = Report {
            adapter,
            e: e.to_vec(),
            height: args.height,
            solution,
        };
        write_report(file.reopen().unwrap(), &report).unwrap();

        let written: serde_json::Value = serde_json::from_reader(File::open(file.path()).unwrap()).unwrap();
        assert_eq!(written["adapter"], "standard");
        assert_eq!(written["e"].as_array().unwrap().len(), 51);
        assert_eq!(written["solution"]["delays"]["dt"]["data"].as_array().unwrap().len(), 51);
    }
}
