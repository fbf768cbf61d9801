//! Convergence diagnostics across chains.
//!
//! - split-free potential scale reduction `R̂`
//! - effective sample size with Geyer's initial monotone sequence

use serde::Serialize;

use crate::domain::{ConvergenceSummary, ModelConfig};
use crate::fit::sampler::ChainTrace;

/// Diagnostics for one scalar parameter.
#[derive(Debug, Clone, Serialize)]
pub struct ParameterDiagnostic {
    pub name: &'static str,
    /// `None` with fewer than two chains.
    pub r_hat: Option<f64>,
    pub ess: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvergenceDiagnostics {
    pub parameters: Vec<ParameterDiagnostic>,
    pub chains_used: usize,
    pub chains_diverged: usize,
}

impl ConvergenceDiagnostics {
    pub fn max_r_hat(&self) -> Option<f64> {
        self.parameters
            .iter()
            .filter_map(|p| p.r_hat)
            .reduce(|a, r| if r.is_nan() || r > a { r } else { a })
    }

    pub fn min_ess(&self) -> f64 {
        self.parameters.iter().map(|p| p.ess).fold(f64::INFINITY, f64::min)
    }

    /// Human-readable list of threshold violations; empty when converged.
    pub fn problems(&self, config: &ModelConfig) -> Vec<String> {
        let mut out = Vec::new();
        // R-hat needs at least two chains; without it nothing checks mixing.
        if self.chains_used < 2 {
            out.push(format!("R-hat unavailable with {} surviving chain(s)", self.chains_used));
        }
        for p in &self.parameters {
            if let Some(r) = p.r_hat {
                if r.is_nan() || r > config.r_hat_threshold {
                    out.push(format!("{} R-hat {:.3} > {:.2}", p.name, r, config.r_hat_threshold));
                }
            }
            if p.ess < config.min_ess {
                out.push(format!("{} ESS {:.0} < {:.0}", p.name, p.ess, config.min_ess));
            }
        }
        if self.chains_diverged > 0 {
            out.push(format!("{} chain(s) diverged and were discarded", self.chains_diverged));
        }
        out
    }

    pub fn summary(&self, config: &ModelConfig) -> ConvergenceSummary {
        ConvergenceSummary {
            max_r_hat: self.max_r_hat(),
            min_ess: self.min_ess(),
            converged: self.problems(config).is_empty(),
        }
    }
}

/// Diagnose the five model parameters over the surviving chains.
pub fn diagnose(chains: &[ChainTrace], diverged: usize) -> ConvergenceDiagnostics {
    let tau: Vec<Vec<f64>> = chains.iter().map(|c| c.tau.iter().map(|&t| t as f64).collect()).collect();
    let tau_refs: Vec<&[f64]> = tau.iter().map(Vec::as_slice).collect();

    let parameters = vec![
        parameter("tau", &tau_refs),
        parameter("mu_1", &column(chains, |c| &c.mu_pre)),
        parameter("mu_2", &column(chains, |c| &c.mu_post)),
        parameter("sigma_1", &column(chains, |c| &c.sigma_pre)),
        parameter("sigma_2", &column(chains, |c| &c.sigma_post)),
    ];

    ConvergenceDiagnostics {
        parameters,
        chains_used: chains.len(),
        chains_diverged: diverged,
    }
}

fn column<'a>(chains: &'a [ChainTrace], f: impl Fn(&'a ChainTrace) -> &'a Vec<f64>) -> Vec<&'a [f64]> {
    chains.iter().map(|c| f(c).as_slice()).collect()
}

fn parameter(name: &'static str, chains: &[&[f64]]) -> ParameterDiagnostic {
    ParameterDiagnostic {
        name,
        r_hat: r_hat(chains),
        ess: effective_sample_size(chains),
    }
}

/// Within-chain variance `W`, between-chain variance `B` and `var⁺`.
fn variance_components(chains: &[&[f64]]) -> Option<(f64, f64, f64)> {
    let m = chains.len();
    let n = chains.iter().map(|c| c.len()).min()?;
    if m == 0 || n < 2 {
        return None;
    }
    let nf = n as f64;

    let means: Vec<f64> = chains.iter().map(|c| c[..n].iter().sum::<f64>() / nf).collect();
    let grand = means.iter().sum::<f64>() / m as f64;

    let w = chains
        .iter()
        .zip(&means)
        .map(|(c, &mu)| c[..n].iter().map(|v| (v - mu).powi(2)).sum::<f64>() / (nf - 1.0))
        .sum::<f64>()
        / m as f64;
    let b = if m > 1 {
        nf * means.iter().map(|mu| (mu - grand).powi(2)).sum::<f64>() / (m as f64 - 1.0)
    } else {
        0.0
    };
    let var_plus = (nf - 1.0) / nf * w + b / nf;
    Some((w, b, var_plus))
}

/// Gelman-Rubin `R̂`. `None` with fewer than two chains or draws.
pub fn r_hat(chains: &[&[f64]]) -> Option<f64> {
    if chains.len() < 2 {
        return None;
    }
    let (w, b, var_plus) = variance_components(chains)?;
    if w <= 0.0 {
        // All chains constant: agreement iff they sit on the same value.
        return Some(if b <= 0.0 { 1.0 } else { f64::INFINITY });
    }
    Some((var_plus / w).sqrt())
}

/// Multi-chain effective sample size.
pub fn effective_sample_size(chains: &[&[f64]]) -> f64 {
    let Some(n) = chains.iter().map(|c| c.len()).min() else {
        return 0.0;
    };
    let m = chains.len();
    let total = (m * n) as f64;
    let Some((w, _, var_plus)) = variance_components(chains) else {
        return total;
    };
    if var_plus <= 0.0 {
        return total;
    }

    let acovs: Vec<Vec<f64>> = chains.iter().map(|c| autocovariance(&c[..n])).collect();
    let mean_acov = |t: usize| acovs.iter().map(|a| a[t]).sum::<f64>() / m as f64;
    let rho = |t: usize| 1.0 - (w - mean_acov(t)) / var_plus;

    // Geyer: sum consecutive pairs while positive, forcing the pair sums to
    // be non-increasing.
    let mut sum_pairs = 0.0;
    let mut prev_pair = f64::INFINITY;
    let mut t = 0;
    while t + 1 < n {
        let pair = rho(t) + rho(t + 1);
        if pair <= 0.0 {
            break;
        }
        let pair = pair.min(prev_pair);
        sum_pairs += pair;
        prev_pair = pair;
        t += 2;
    }
    let tau_int = (2.0 * sum_pairs - 1.0).max(1.0 / total.log10().max(1.0));
    total / tau_int
}

/// Biased autocovariance at every lag (lag 0 uses the `n - 1` normaliser to
/// match `W`).
fn autocovariance(x: &[f64]) -> Vec<f64> {
    let n = x.len();
    let nf = n as f64;
    let mu = x.iter().sum::<f64>() / nf;
    let centred: Vec<f64> = x.iter().map(|v| v - mu).collect();
    (0..n)
        .map(|lag| {
            let s: f64 = centred[..n - lag].iter().zip(&centred[lag..]).map(|(a, b)| a * b).sum();
            if lag == 0 { s / (nf - 1.0) } else { s / nf }
        })
        .collect()
}
