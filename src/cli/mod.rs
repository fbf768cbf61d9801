//! Command-line parsing for the Brent regime analysis pipeline.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! stage logic. Each stage subcommand converts its flags into a validated
//! config from `domain`.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::data::Regime;
use crate::domain::{AssociationConfig, ModelConfig};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "regimes",
    version,
    about = "Bayesian change-point detection and event impact analysis for Brent crude"
)]
pub struct Cli {
    /// Artifact directory (falls back to BRENT_DATA_DIR, then `data`).
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Debug-level logging (overrides RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download the Brent spot series from FRED into the raw price file.
    Fetch(FetchArgs),
    /// Write a synthetic raw price file with known regimes.
    Simulate(SimulateArgs),
    /// Clean raw prices and compute log-returns.
    Preprocess,
    /// Fit the Bayesian change-point model to the processed returns.
    Detect(ModelArgs),
    /// Match change points to events and measure their impact.
    Associate(AssociationArgs),
    /// Preprocess, detect and associate in one go.
    Run(RunArgs),
    /// Build the JSON document served to the dashboard.
    Dashboard(DashboardArgs),
}

#[derive(Debug, Args, Clone)]
pub struct FetchArgs {
    /// First observation date (YYYY-MM-DD).
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last observation date (YYYY-MM-DD).
    #[arg(long)]
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    /// Regime as LEN:MU:SIGMA of daily log returns; repeat for more regimes.
    #[arg(long = "regime", value_name = "LEN:MU:SIGMA")]
    pub regimes: Vec<Regime>,

    /// First trading date.
    #[arg(long, default_value = "2015-01-01")]
    pub start: NaiveDate,

    /// Opening price (USD/bbl).
    #[arg(long, default_value_t = 60.0)]
    pub start_price: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl SimulateArgs {
    /// Two regimes with a clear mean and volatility shift when none were given.
    pub fn regimes_or_default(&self) -> Vec<Regime> {
        if !self.regimes.is_empty() {
            return self.regimes.clone();
        }
        vec![
            Regime {
                len: 500,
                mu: 0.0,
                sigma: 0.01,
            },
            Regime {
                len: 500,
                mu: -0.002,
                sigma: 0.03,
            },
        ]
    }
}

/// Sampler and model options.
#[derive(Debug, Args, Clone)]
pub struct ModelArgs {
    /// Retained draws per chain.
    #[arg(long, default_value_t = 2000)]
    pub draws: usize,

    /// Warm-up iterations per chain (discarded).
    #[arg(long, default_value_t = 1000)]
    pub warmup: usize,

    #[arg(long, default_value_t = 4)]
    pub chains: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Number of change points to locate.
    #[arg(short = 'k', long = "change-points", default_value_t = 1)]
    pub change_points: usize,

    /// Posterior mass of the credible interval for the switch index.
    #[arg(long, default_value_t = 0.94)]
    pub credible_mass: f64,

    /// Minimum returns on each side of a switch.
    #[arg(long, default_value_t = 5)]
    pub min_segment: usize,

    #[arg(long, default_value_t = 0.1)]
    pub mu_prior_sd: f64,

    #[arg(long, default_value_t = 0.1)]
    pub sigma_prior_sd: f64,

    /// Flag runs whose R-hat exceeds this.
    #[arg(long, default_value_t = 1.05)]
    pub r_hat_threshold: f64,

    /// Flag runs whose effective sample size falls below this.
    #[arg(long, default_value_t = 100.0)]
    pub min_ess: f64,

    /// Only model returns on or after this date.
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Only model returns on or before this date.
    #[arg(long)]
    pub end: Option<NaiveDate>,
}

impl ModelArgs {
    pub fn to_config(&self) -> ModelConfig {
        ModelConfig {
            draws: self.draws,
            warmup: self.warmup,
            chains: self.chains,
            seed: self.seed,
            change_points: self.change_points,
            credible_mass: self.credible_mass,
            min_segment: self.min_segment,
            mu_prior_sd: self.mu_prior_sd,
            sigma_prior_sd: self.sigma_prior_sd,
            r_hat_threshold: self.r_hat_threshold,
            min_ess: self.min_ess,
            start: self.start,
            end: self.end,
        }
    }
}

/// Event matching options.
#[derive(Debug, Args, Clone)]
pub struct AssociationArgs {
    /// Matching tolerance and pre/post window length (calendar days).
    #[arg(long, default_value_t = 30)]
    pub window_days: i64,

    /// Minimum prices and returns required in each window.
    #[arg(long, default_value_t = 3)]
    pub min_window_obs: usize,

    /// Event list CSV (`Event,Date[,Category]`); defaults to `<data-dir>/events.csv`
    /// if present, else the built-in list.
    #[arg(long, value_name = "CSV")]
    pub events: Option<PathBuf>,
}

impl AssociationArgs {
    pub fn to_config(&self) -> AssociationConfig {
        AssociationConfig {
            window_days: self.window_days,
            min_window_obs: self.min_window_obs,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    #[command(flatten)]
    pub association: AssociationArgs,
}

#[derive(Debug, Args, Clone)]
pub struct DashboardArgs {
    /// Write the JSON here instead of stdout.
    #[arg(short, long, value_name = "JSON")]
    pub output: Option<PathBuf>,

    /// Pretty-print the JSON.
    #[arg(long)]
    pub pretty: bool,
}
