//! Bayesian change-point fitting.
//!
//! Responsibilities:
//!
//! - run independent MCMC chains per segment (parallel, collected in order)
//! - pool retained draws and extract τ̂, its credible interval and the
//!   regime parameters conditioned on τ̂
//! - attach convergence diagnostics; flag, never fail, on poor mixing
//! - locate more than one switch by binary segmentation

pub mod diagnostics;
pub mod likelihood;
pub mod sampler;
pub mod segmentation;
pub mod summary;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::domain::{ChangePointEstimate, ConvergenceWarning, ModelConfig, ReturnObservation};
use crate::error::{AppError, DataError};

pub use diagnostics::{ConvergenceDiagnostics, ParameterDiagnostic};
use likelihood::PrefixSums;
use sampler::{ChainTrace, run_chain};
use segmentation::{Split, binary_segmentation};
use summary::{conditional_means, narrowest_interval, posterior_mode};

/// One located switch point with everything needed to report it.
#[derive(Debug, Clone)]
pub struct ChangePointFit {
    pub estimate: ChangePointEstimate,
    pub diagnostics: ConvergenceDiagnostics,
    pub warning: Option<ConvergenceWarning>,
    /// Two-regime vs one-regime log-likelihood gain at τ̂ within its segment.
    pub log_gain: f64,
    /// Mean post-warm-up σ acceptance over surviving chains.
    pub acceptance: f64,
    /// Index within the analysed window.
    position: usize,
}

impl Split for ChangePointFit {
    fn index(&self) -> usize {
        self.position
    }

    fn gain(&self) -> f64 {
        self.log_gain
    }
}

/// Result of one model run, sorted by index.
#[derive(Debug, Clone)]
pub struct ChangePointRun {
    pub fits: Vec<ChangePointFit>,
    /// Half-open range of return indices that were modelled.
    pub analysed: (usize, usize),
}

impl ChangePointRun {
    pub fn estimates(&self) -> Vec<ChangePointEstimate> {
        self.fits.iter().map(|f| f.estimate.clone()).collect()
    }

    pub fn warnings(&self) -> Vec<ConvergenceWarning> {
        self.fits.iter().filter_map(|f| f.warning.clone()).collect()
    }
}

/// Fit `config.change_points` switch points to `returns`.
///
/// Indices in the returned estimates always refer to positions in `returns`,
/// even when an analysis date range restricts what is modelled.
pub fn fit_change_point(returns: &[ReturnObservation], config: &ModelConfig) -> Result<ChangePointRun, AppError> {
    config.validate()?;

    let (lo, hi) = analysis_range(returns, config);
    let window = &returns[lo..hi];
    let min_len = 2 * config.min_segment;
    if window.len() < min_len {
        return Err(DataError::new(format!(
            "need at least {min_len} returns to fit a change point (min_segment = {}), got {}.",
            config.min_segment,
            window.len()
        ))
        .into());
    }
    if let Some(pos) = window.iter().position(|r| !r.log_return.is_finite()) {
        return Err(DataError::new(format!(
            "non-finite log return on {}.",
            window[pos].date
        ))
        .into());
    }

    info!(
        returns = window.len(),
        start = %window[0].date,
        end = %window[window.len() - 1].date,
        change_points = config.change_points,
        chains = config.chains,
        draws = config.draws,
        warmup = config.warmup,
        "fitting change-point model"
    );

    let y: Vec<f64> = window.iter().map(|r| r.log_return).collect();
    let fits = binary_segmentation(y.len(), config.change_points, min_len, |start, end| {
        fit_segment(&y[start..end], start, lo, returns, config)
    })?;

    if fits.len() < config.change_points {
        warn!(
            requested = config.change_points,
            found = fits.len(),
            "fewer change points than requested; segments too short to split further"
        );
    }

    Ok(ChangePointRun { fits, analysed: (lo, hi) })
}

/// Half-open index range of `returns` inside the configured date range.
fn analysis_range(returns: &[ReturnObservation], config: &ModelConfig) -> (usize, usize) {
    let lo = config
        .start
        .map_or(0, |start| returns.partition_point(|r| r.date < start));
    let hi = config
        .end
        .map_or(returns.len(), |end| returns.partition_point(|r| r.date <= end));
    (lo, hi.max(lo))
}

fn segment_seed(seed: u64, start: usize) -> u64 {
    seed ^ (start as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9)
}

fn chain_seed(seed: u64, chain: usize) -> u64 {
    seed.wrapping_add((chain as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Fit one segment `y` that starts at `start` within the window at `offset`.
fn fit_segment(
    y: &[f64],
    start: usize,
    offset: usize,
    returns: &[ReturnObservation],
    config: &ModelConfig,
) -> Result<ChangePointFit, AppError> {
    let prefix = PrefixSums::new(y);
    let seed = segment_seed(config.seed, start);

    let traces: Vec<ChainTrace> = (0..config.chains)
        .into_par_iter()
        .map(|c| run_chain(&prefix, config, chain_seed(seed, c)))
        .collect();

    let total = traces.len();
    let chains: Vec<ChainTrace> = traces
        .into_iter()
        .enumerate()
        .filter_map(|(c, t)| {
            if t.diverged {
                warn!(chain = c, segment_start = start, "chain diverged; discarding");
                None
            } else {
                Some(t)
            }
        })
        .collect();
    let diverged = total - chains.len();
    if chains.is_empty() {
        return Err(AppError::ModelFit(format!(
            "all {total} chains diverged on segment starting at return {}.",
            offset + start
        )));
    }

    let tau: Vec<usize> = chains.iter().flat_map(|c| c.tau.iter().copied()).collect();
    let mu_pre = pooled(&chains, |c| &c.mu_pre);
    let mu_post = pooled(&chains, |c| &c.mu_post);
    let sigma_pre = pooled(&chains, |c| &c.sigma_pre);
    let sigma_post = pooled(&chains, |c| &c.sigma_post);

    let Some((tau_hat, count)) = posterior_mode(&tau) else {
        return Err(AppError::ModelFit("sampler produced no retained draws.".into()));
    };
    let (ci_lo, ci_hi) = narrowest_interval(&tau, config.credible_mass, tau_hat)
        .ok_or_else(|| AppError::ModelFit("empty posterior for the switch index.".into()))?;
    let means = conditional_means(&tau, [&mu_pre, &mu_post, &sigma_pre, &sigma_post], tau_hat)
        .ok_or_else(|| AppError::ModelFit("no draws at the posterior mode.".into()))?;

    let diagnostics = diagnostics::diagnose(&chains, diverged);
    let convergence = diagnostics.summary(config);

    let global = |local: usize| offset + start + local;
    let date_at = |idx: usize| {
        returns
            .get(idx)
            .map(|r| r.date)
            .ok_or_else(|| AppError::ModelFit(format!("switch index {idx} outside the return series.")))
    };
    let index = global(tau_hat);
    let estimate = ChangePointEstimate {
        index,
        date: date_at(index)?,
        ci_low: global(ci_lo),
        ci_high: global(ci_hi),
        ci_low_date: date_at(global(ci_lo))?,
        ci_high_date: date_at(global(ci_hi))?,
        probability: count as f64 / tau.len() as f64,
        posterior_mean_pre: means.mu_pre,
        posterior_mean_post: means.mu_post,
        posterior_std_pre: means.sigma_pre,
        posterior_std_post: means.sigma_post,
        convergence,
    };

    let problems = diagnostics.problems(config);
    let warning = if problems.is_empty() {
        None
    } else {
        let w = ConvergenceWarning {
            change_point_date: estimate.date,
            message: problems.join("; "),
        };
        warn!(%w, "convergence check failed");
        Some(w)
    };

    let acceptance = chains
        .iter()
        .map(|c| 0.5 * (c.acceptance_pre + c.acceptance_post))
        .sum::<f64>()
        / chains.len() as f64;
    let log_gain = prefix.split_gain(tau_hat);

    debug!(
        index,
        date = %estimate.date,
        ci_low = estimate.ci_low,
        ci_high = estimate.ci_high,
        probability = estimate.probability,
        log_gain,
        acceptance,
        "segment fitted"
    );

    Ok(ChangePointFit {
        estimate,
        diagnostics,
        warning,
        log_gain,
        acceptance,
        position: start + tau_hat,
    })
}

fn pooled(chains: &[ChainTrace], f: impl Fn(&ChainTrace) -> &Vec<f64>) -> Vec<f64> {
    chains.iter().flat_map(|c| f(c).iter().copied()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::prelude::*;
    use rand::rngs::StdRng;
    use rand_distr::Normal;

    fn regimes(seed: u64, parts: &[(usize, f64)]) -> Vec<ReturnObservation> {
        let mut rng = StdRng::seed_from_u64(seed);
        let d0 = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let mut out = Vec::new();
        for &(len, mu) in parts {
            let dist = Normal::new(mu, 0.01).unwrap();
            for _ in 0..len {
                let date = d0 + chrono::Days::new(out.len() as u64);
                out.push(ReturnObservation {
                    date,
                    log_return: dist.sample(&mut rng),
                });
            }
        }
        out
    }

    fn quick() -> ModelConfig {
        ModelConfig {
            draws: 400,
            warmup: 300,
            chains: 2,
            ..ModelConfig::default()
        }
    }

    #[test]
    fn locates_switch_between_separated_regimes() {
        for seed in [1, 2, 3] {
            let returns = regimes(seed, &[(500, 0.0), (500, 0.05)]);
            let run = fit_change_point(&returns, &ModelConfig { seed, ..quick() }).unwrap();
            assert_eq!(run.fits.len(), 1);
            let est = &run.fits[0].estimate;
            assert!(est.index.abs_diff(500) <= 10, "seed {seed}: tau {}", est.index);
            assert_eq!(est.date, returns[est.index].date);
            assert!((est.posterior_mean_post - 0.05).abs() < 0.005);
            assert!((est.posterior_std_pre - 0.01).abs() < 0.003);
        }
    }

    #[test]
    fn credible_interval_contains_estimate() {
        let returns = regimes(4, &[(300, 0.0), (300, 0.004)]);
        let run = fit_change_point(&returns, &quick()).unwrap();
        let est = &run.fits[0].estimate;
        assert!(est.ci_low <= est.index && est.index <= est.ci_high);
        assert!(est.ci_low_date <= est.date && est.date <= est.ci_high_date);
        assert!(est.probability > 0.0 && est.probability <= 1.0);
    }

    #[test]
    fn two_switches_sorted_and_unique() {
        let returns = regimes(5, &[(100, 0.0), (200, 0.04), (700, -0.02)]);
        let config = ModelConfig {
            change_points: 2,
            ..quick()
        };
        let run = fit_change_point(&returns, &config).unwrap();
        let idx: Vec<usize> = run.fits.iter().map(|f| f.estimate.index).collect();
        assert_eq!(idx.len(), 2);
        assert!(idx[0] < idx[1]);
        assert!(idx[0].abs_diff(100) <= 5, "{idx:?}");
        assert!(idx[1].abs_diff(300) <= 5, "{idx:?}");
    }

    #[test]
    fn same_seed_reproduces_estimate() {
        let returns = regimes(6, &[(150, 0.0), (150, 0.01)]);
        let a = fit_change_point(&returns, &quick()).unwrap().estimates();
        let b = fit_change_point(&returns, &quick()).unwrap().estimates();
        assert_eq!(a, b);
    }

    #[test]
    fn too_short_series_is_data_error() {
        let returns = regimes(7, &[(6, 0.0)]);
        let err = fit_change_point(&returns, &quick()).unwrap_err();
        assert!(matches!(err, AppError::Data(_)));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn analysis_range_keeps_global_indices() {
        let returns = regimes(8, &[(200, 0.0), (200, 0.05), (200, 0.0)]);
        let config = ModelConfig {
            start: Some(returns[150].date),
            end: Some(returns[349].date),
            ..quick()
        };
        let run = fit_change_point(&returns, &config).unwrap();
        assert_eq!(run.analysed, (150, 350));
        let est = &run.fits[0].estimate;
        assert!(est.index.abs_diff(200) <= 5, "tau {}", est.index);
        assert_eq!(est.date, returns[est.index].date);
    }

    #[test]
    fn short_run_is_flagged_not_failed() {
        let returns = regimes(9, &[(100, 0.0), (100, 0.03)]);
        let config = ModelConfig {
            draws: 20,
            warmup: 20,
            chains: 2,
            ..ModelConfig::default()
        };
        let run = fit_change_point(&returns, &config).unwrap();
        let fit = &run.fits[0];
        assert!(!fit.estimate.convergence.converged);
        assert!(fit.warning.is_some());
        assert_eq!(run.warnings().len(), 1);
    }

    #[test]
    fn single_chain_run_is_flagged() {
        let returns = regimes(10, &[(200, 0.0), (200, 0.05)]);
        let config = ModelConfig {
            chains: 1,
            ..quick()
        };
        let run = fit_change_point(&returns, &config).unwrap();
        let fit = &run.fits[0];
        assert!(fit.estimate.index.abs_diff(200) <= 10);
        assert_eq!(fit.estimate.convergence.max_r_hat, None);
        assert!(!fit.estimate.convergence.converged);
        let warning = fit.warning.as_ref().unwrap();
        assert!(warning.message.contains("R-hat unavailable"), "{}", warning.message);
    }

    #[test]
    fn all_chains_diverging_is_model_fit_error() {
        let d0 = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let returns: Vec<ReturnObservation> = (0..200u64)
            .map(|i| ReturnObservation {
                date: d0 + chrono::Days::new(i),
                log_return: if i % 2 == 0 { 1e200 } else { -1e200 },
            })
            .collect();
        let err = fit_change_point(&returns, &quick()).unwrap_err();
        assert!(matches!(err, AppError::ModelFit(_)), "{err}");
        assert_eq!(err.exit_code(), 4);
    }
}
