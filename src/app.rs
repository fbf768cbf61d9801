//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up logging
//! - resolves the artifact directory
//! - runs the requested stage(s) through `pipeline`
//! - prints the stage reports to stdout

use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use tracing::debug;

use crate::cli::{AssociationArgs, Cli, Command, DashboardArgs, FetchArgs, ModelArgs, RunArgs, SimulateArgs};
use crate::error::AppError;
use crate::io::{ArtifactPaths, write_atomic};

pub mod pipeline;

/// Environment variable consulted when `--data-dir` is not given.
pub const DATA_DIR_ENV: &str = "BRENT_DATA_DIR";
const DEFAULT_DATA_DIR: &str = "data";

/// Entry point for the `regimes` binary.
pub fn run() -> Result<(), AppError> {
    // Load .env before anything reads the environment (FRED key, data dir).
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    crate::logging::init(cli.verbose);

    let paths = ArtifactPaths::new(resolve_data_dir(cli.data_dir, std::env::var_os(DATA_DIR_ENV).map(PathBuf::from)));
    debug!(data_dir = %paths.dir().display(), "resolved artifact directory");

    match cli.command {
        Command::Fetch(args) => handle_fetch(&paths, args),
        Command::Simulate(args) => handle_simulate(&paths, args),
        Command::Preprocess => handle_preprocess(&paths),
        Command::Detect(args) => handle_detect(&paths, &args),
        Command::Associate(args) => handle_associate(&paths, &args),
        Command::Run(args) => handle_run(&paths, args),
        Command::Dashboard(args) => handle_dashboard(&paths, args),
    }
}

/// Flag, then environment, then `./data`.
fn resolve_data_dir(flag: Option<PathBuf>, env: Option<PathBuf>) -> PathBuf {
    flag.or(env)
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

fn handle_fetch(paths: &ArtifactPaths, args: FetchArgs) -> Result<(), AppError> {
    let rows = pipeline::run_fetch(paths, args.start, args.end)?;
    println!("Fetched {rows} rows into {}", paths.raw_prices().display());
    Ok(())
}

fn handle_simulate(paths: &ArtifactPaths, args: SimulateArgs) -> Result<(), AppError> {
    let regimes = args.regimes_or_default();
    let rows = pipeline::run_simulate(paths, &regimes, args.start, args.start_price, args.seed)?;
    println!("Simulated {rows} prices into {}", paths.raw_prices().display());
    Ok(())
}

fn handle_preprocess(paths: &ArtifactPaths) -> Result<(), AppError> {
    let out = pipeline::run_preprocess(paths)?;
    println!(
        "{}",
        crate::report::format_preprocess_summary(&out.preprocessed, &out.summary, &out.stationarity)
    );
    Ok(())
}

fn handle_detect(paths: &ArtifactPaths, args: &ModelArgs) -> Result<(), AppError> {
    let run = pipeline::run_detect(paths, &args.to_config())?;
    println!(
        "{}",
        crate::report::format_change_points(&run.estimates(), Some(run.fits.as_slice()), &run.warnings())
    );
    Ok(())
}

fn handle_associate(paths: &ArtifactPaths, args: &AssociationArgs) -> Result<(), AppError> {
    let association = pipeline::run_associate(paths, &args.to_config(), args.events.as_deref())?;
    println!("{}", crate::report::format_impacts(&association));
    Ok(())
}

fn handle_run(paths: &ArtifactPaths, args: RunArgs) -> Result<(), AppError> {
    // Validate both stages up front so a bad flag does not cost a model fit.
    let model = args.model.to_config();
    let association = args.association.to_config();
    model.validate()?;
    association.validate()?;

    handle_preprocess(paths)?;
    handle_detect(paths, &args.model)?;
    handle_associate(paths, &args.association)
}

fn handle_dashboard(paths: &ArtifactPaths, args: DashboardArgs) -> Result<(), AppError> {
    let payload = crate::dashboard::build_payload(paths)?;
    let target = args.output.clone().unwrap_or_else(|| PathBuf::from("<stdout>"));
    let json = if args.pretty {
        serde_json::to_string_pretty(&payload)
    } else {
        serde_json::to_string(&payload)
    }
    .map_err(|e| AppError::json(&target, e))?;

    match &args.output {
        Some(path) => write_atomic(path, |w| {
            w.write_all(json.as_bytes())
                .and_then(|()| w.write_all(b"\n"))
                .map_err(|e| AppError::io(path, e))
        }),
        None => {
            println!("{json}");
            Ok(())
        }
    }
}
