//! Metropolis-within-Gibbs sampler for the single switch-point model.
//!
//! Model over `y_0..y_{n-1}`:
//!
//! ```text
//! τ        ~ DiscreteUniform(min_segment, n - min_segment)
//! μ₁, μ₂   ~ Normal(0, mu_prior_sd)
//! σ₁, σ₂   ~ HalfNormal(sigma_prior_sd)
//! y_i      ~ Normal(μ₁, σ₁)  for i < τ
//! y_i      ~ Normal(μ₂, σ₂)  for i ≥ τ
//! ```
//!
//! One sweep:
//! 1. τ | μ, σ: exact categorical draw from the full conditional (log-space)
//! 2. μₖ | τ, σₖ: conjugate normal draw
//! 3. σₖ | τ, μₖ: random-walk Metropolis on `ln σₖ`; the step adapts during
//!    warm-up only so retained draws come from a fixed kernel

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::StandardNormal;

use crate::domain::ModelConfig;
use crate::fit::likelihood::{PrefixSums, SegmentStats};
use crate::math::log_sum_exp;

const ADAPT_WINDOW: usize = 50;
const TARGET_ACCEPTANCE: f64 = 0.44;
const STEP_MIN: f64 = 1e-3;
const STEP_MAX: f64 = 2.0;

/// Retained draws of one chain.
#[derive(Debug, Clone)]
pub struct ChainTrace {
    pub tau: Vec<usize>,
    pub mu_pre: Vec<f64>,
    pub mu_post: Vec<f64>,
    pub sigma_pre: Vec<f64>,
    pub sigma_post: Vec<f64>,
    /// Post-warm-up acceptance rates of the two σ updates.
    pub acceptance_pre: f64,
    pub acceptance_post: f64,
    /// Set when the chain hit a non-finite state; its draws must not be used.
    pub diverged: bool,
}

impl ChainTrace {
    fn with_capacity(n: usize) -> Self {
        Self {
            tau: Vec::with_capacity(n),
            mu_pre: Vec::with_capacity(n),
            mu_post: Vec::with_capacity(n),
            sigma_pre: Vec::with_capacity(n),
            sigma_post: Vec::with_capacity(n),
            acceptance_pre: 0.0,
            acceptance_post: 0.0,
            diverged: false,
        }
    }

    pub fn len(&self) -> usize {
        self.tau.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tau.is_empty()
    }
}

/// Random-walk state for one `ln σ` coordinate.
#[derive(Debug, Clone, Copy)]
struct LogSigmaWalk {
    step: f64,
    window_accepted: usize,
    accepted: usize,
}

impl LogSigmaWalk {
    fn new() -> Self {
        Self {
            step: 0.1,
            window_accepted: 0,
            accepted: 0,
        }
    }

    fn adapt(&mut self) {
        let rate = self.window_accepted as f64 / ADAPT_WINDOW as f64;
        let scale = if rate > TARGET_ACCEPTANCE { 1.1 } else { 0.9 };
        self.step = (self.step * scale).clamp(STEP_MIN, STEP_MAX);
        self.window_accepted = 0;
    }
}

/// Run one chain over the series summarised by `prefix`.
///
/// The caller guarantees `prefix.len() >= 2 * config.min_segment`.
pub fn run_chain(prefix: &PrefixSums, config: &ModelConfig, seed: u64) -> ChainTrace {
    let n = prefix.len();
    let lo = config.min_segment;
    let hi = n - config.min_segment;

    let mut rng = StdRng::seed_from_u64(seed);
    let mut trace = ChainTrace::with_capacity(config.draws);

    let overall = prefix.segment(0, n);
    let centre = overall.mean();
    let spread = overall.variance().sqrt().max(1e-6);

    let mut mu_pre = centre + 0.1 * spread * std_normal(&mut rng);
    let mut mu_post = centre + 0.1 * spread * std_normal(&mut rng);
    let mut sigma_pre = spread * (0.1 * std_normal(&mut rng)).exp();
    let mut sigma_post = spread * (0.1 * std_normal(&mut rng)).exp();

    let mut walk_pre = LogSigmaWalk::new();
    let mut walk_post = LogSigmaWalk::new();
    let mut log_w = Vec::with_capacity(hi - lo + 1);

    let total = config.warmup + config.draws;
    for iter in 0..total {
        prefix.tau_log_weights(lo, hi, (mu_pre, sigma_pre), (mu_post, sigma_post), &mut log_w);
        let Some(k) = sample_log_categorical(&log_w, &mut rng) else {
            trace.diverged = true;
            break;
        };
        let tau = lo + k;

        let seg_pre = prefix.segment(0, tau);
        let seg_post = prefix.segment(tau, n);

        mu_pre = draw_mu(&seg_pre, sigma_pre, config.mu_prior_sd, &mut rng);
        mu_post = draw_mu(&seg_post, sigma_post, config.mu_prior_sd, &mut rng);

        let warm = iter < config.warmup;
        sigma_pre = step_log_sigma(&seg_pre, mu_pre, sigma_pre, config.sigma_prior_sd, &mut walk_pre, warm, &mut rng);
        sigma_post = step_log_sigma(&seg_post, mu_post, sigma_post, config.sigma_prior_sd, &mut walk_post, warm, &mut rng);

        if warm && (iter + 1) % ADAPT_WINDOW == 0 {
            walk_pre.adapt();
            walk_post.adapt();
        }

        let finite = [mu_pre, mu_post, sigma_pre, sigma_post].iter().all(|v| v.is_finite())
            && sigma_pre > 0.0
            && sigma_post > 0.0;
        if !finite {
            trace.diverged = true;
            break;
        }

        if !warm {
            trace.tau.push(tau);
            trace.mu_pre.push(mu_pre);
            trace.mu_post.push(mu_post);
            trace.sigma_pre.push(sigma_pre);
            trace.sigma_post.push(sigma_post);
        }
    }

    if config.draws > 0 {
        trace.acceptance_pre = walk_pre.accepted as f64 / config.draws as f64;
        trace.acceptance_post = walk_post.accepted as f64 / config.draws as f64;
    }
    trace
}

fn std_normal(rng: &mut StdRng) -> f64 {
    rng.sample(StandardNormal)
}

/// Draw an index with probability proportional to `exp(log_w[k])`.
///
/// Returns `None` if the weights do not normalise (all `-inf`, or any NaN).
pub fn sample_log_categorical<R: Rng>(log_w: &[f64], rng: &mut R) -> Option<usize> {
    let norm = log_sum_exp(log_w);
    if !norm.is_finite() {
        return None;
    }

    let mut cumulative = Vec::with_capacity(log_w.len());
    let mut acc = 0.0;
    for &w in log_w {
        acc += (w - norm).exp();
        cumulative.push(acc);
    }

    let u = rng.gen_range(0.0..acc);
    let k = cumulative.partition_point(|&c| c <= u);
    Some(k.min(log_w.len() - 1))
}

/// Conjugate update of a segment mean with known σ and a zero-centred normal prior.
fn draw_mu(seg: &SegmentStats, sigma: f64, prior_sd: f64, rng: &mut StdRng) -> f64 {
    let precision = 1.0 / (prior_sd * prior_sd) + seg.n as f64 / (sigma * sigma);
    let mean = (seg.sum / (sigma * sigma)) / precision;
    mean + std_normal(rng) / precision.sqrt()
}

/// Log target of `η = ln σ`: likelihood + half-normal prior + Jacobian.
fn log_sigma_target(seg: &SegmentStats, mu: f64, eta: f64, prior_sd: f64) -> f64 {
    let sigma = eta.exp();
    seg.log_likelihood(mu, sigma) - sigma * sigma / (2.0 * prior_sd * prior_sd) + eta
}

fn step_log_sigma(
    seg: &SegmentStats,
    mu: f64,
    sigma: f64,
    prior_sd: f64,
    walk: &mut LogSigmaWalk,
    warm: bool,
    rng: &mut StdRng,
) -> f64 {
    let eta = sigma.ln();
    let proposal = eta + walk.step * std_normal(rng);
    let log_alpha = log_sigma_target(seg, mu, proposal, prior_sd) - log_sigma_target(seg, mu, eta, prior_sd);

    let u: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
    if log_alpha.is_finite() && (log_alpha > 0.0 || u.ln() < log_alpha) {
        if warm {
            walk.window_accepted += 1;
        } else {
            walk.accepted += 1;
        }
        return proposal.exp();
    }
    sigma
}
