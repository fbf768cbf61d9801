//! Stage configurations.
//!
//! Built from CLI flags (plus defaults) in `app`; each config validates itself
//! before a stage starts so bad settings fail fast with exit code 2.

use chrono::NaiveDate;

use crate::error::AppError;

/// Settings for the Bayesian change-point fit.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    /// Retained draws per chain (after warm-up).
    pub draws: usize,
    /// Warm-up iterations per chain, discarded before summaries.
    pub warmup: usize,
    pub chains: usize,
    pub seed: u64,
    /// Number of switch points to locate (not inferred).
    pub change_points: usize,
    /// Posterior mass covered by the τ credible interval.
    pub credible_mass: f64,
    /// Minimum observations on each side of a switch.
    pub min_segment: usize,
    /// Prior scale of μ ~ Normal(0, mu_prior_sd).
    pub mu_prior_sd: f64,
    /// Prior scale of σ ~ HalfNormal(sigma_prior_sd).
    pub sigma_prior_sd: f64,
    pub r_hat_threshold: f64,
    pub min_ess: f64,
    /// Optional inclusive date range restricting the returns that are modelled.
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            draws: 2000,
            warmup: 1000,
            chains: 4,
            seed: 42,
            change_points: 1,
            credible_mass: 0.94,
            min_segment: 5,
            mu_prior_sd: 0.1,
            sigma_prior_sd: 0.1,
            r_hat_threshold: 1.05,
            min_ess: 100.0,
            start: None,
            end: None,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.draws == 0 {
            return Err(AppError::Config("draws must be > 0.".into()));
        }
        if self.chains == 0 {
            return Err(AppError::Config("chains must be > 0.".into()));
        }
        if self.change_points == 0 {
            return Err(AppError::Config("change_points must be > 0.".into()));
        }
        if !(self.credible_mass > 0.0 && self.credible_mass <= 1.0) {
            return Err(AppError::Config(format!(
                "credible_mass must be in (0, 1], got {}.",
                self.credible_mass
            )));
        }
        if self.min_segment == 0 {
            return Err(AppError::Config("min_segment must be > 0.".into()));
        }
        if !(self.mu_prior_sd.is_finite() && self.mu_prior_sd > 0.0) {
            return Err(AppError::Config("mu_prior_sd must be finite and > 0.".into()));
        }
        if !(self.sigma_prior_sd.is_finite() && self.sigma_prior_sd > 0.0) {
            return Err(AppError::Config("sigma_prior_sd must be finite and > 0.".into()));
        }
        if !(self.r_hat_threshold.is_finite() && self.r_hat_threshold >= 1.0) {
            return Err(AppError::Config("r_hat_threshold must be >= 1.".into()));
        }
        if !(self.min_ess.is_finite() && self.min_ess >= 0.0) {
            return Err(AppError::Config("min_ess must be finite and >= 0.".into()));
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if end < start {
                return Err(AppError::Config(format!("analysis range is empty: {start} > {end}.")));
            }
        }
        Ok(())
    }
}

/// Settings for matching change points to events and measuring impact.
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationConfig {
    /// Matching tolerance and pre/post window length, in calendar days.
    pub window_days: i64,
    /// Minimum prices (and returns) required in each window.
    pub min_window_obs: usize,
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self {
            window_days: 30,
            min_window_obs: 3,
        }
    }
}

impl AssociationConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.window_days <= 0 {
            return Err(AppError::Config("window_days must be > 0.".into()));
        }
        // Volatility needs at least two returns.
        if self.min_window_obs < 2 {
            return Err(AppError::Config("min_window_obs must be >= 2.".into()));
        }
        Ok(())
    }
}
