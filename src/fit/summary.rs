//! Posterior summaries of pooled draws.

use std::collections::BTreeMap;

/// Most frequent switch index; ties go to the smaller index.
pub fn posterior_mode(tau: &[usize]) -> Option<(usize, usize)> {
    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    for &t in tau {
        *counts.entry(t).or_default() += 1;
    }
    // Ascending iteration: ties keep the earlier index.
    counts.into_iter().fold(None, |best, (t, c)| match best {
        Some((_, bc)) if bc >= c => best,
        _ => Some((t, c)),
    })
}

/// Narrowest index window holding at least `mass` of the draws.
///
/// Among equally narrow windows one containing `mode` is preferred; if none
/// does, the chosen window is widened to include it.
pub fn narrowest_interval(tau: &[usize], mass: f64, mode: usize) -> Option<(usize, usize)> {
    if tau.is_empty() {
        return None;
    }
    let mut sorted = tau.to_vec();
    sorted.sort_unstable();
    let n = sorted.len();
    let k = ((mass * n as f64).ceil() as usize).clamp(1, n);

    let mut best: Option<(usize, usize)> = None;
    for start in 0..=n - k {
        let (lo, hi) = (sorted[start], sorted[start + k - 1]);
        let better = match best {
            None => true,
            Some((blo, bhi)) => {
                let (w, bw) = (hi - lo, bhi - blo);
                w < bw || (w == bw && contains(lo, hi, mode) && !contains(blo, bhi, mode))
            }
        };
        if better {
            best = Some((lo, hi));
        }
    }
    best.map(|(lo, hi)| (lo.min(mode), hi.max(mode)))
}

fn contains(lo: usize, hi: usize, x: usize) -> bool {
    lo <= x && x <= hi
}

/// Posterior means of the regime parameters given `τ = tau_hat`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConditionalMeans {
    pub mu_pre: f64,
    pub mu_post: f64,
    pub sigma_pre: f64,
    pub sigma_post: f64,
    pub count: usize,
}

pub fn conditional_means(
    tau: &[usize],
    params: [&[f64]; 4],
    tau_hat: usize,
) -> Option<ConditionalMeans> {
    let mut acc = [0.0; 4];
    let mut count = 0usize;
    for (i, &t) in tau.iter().enumerate() {
        if t != tau_hat {
            continue;
        }
        for (a, p) in acc.iter_mut().zip(params) {
            *a += p[i];
        }
        count += 1;
    }
    if count == 0 {
        return None;
    }
    let c = count as f64;
    Some(ConditionalMeans {
        mu_pre: acc[0] / c,
        mu_post: acc[1] / c,
        sigma_pre: acc[2] / c,
        sigma_post: acc[3] / c,
        count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_ties_go_low() {
        assert_eq!(posterior_mode(&[5, 3, 5, 3, 9]), Some((3, 2)));
        assert_eq!(posterior_mode(&[7]), Some((7, 1)));
        assert_eq!(posterior_mode(&[]), None);
    }

    #[test]
    fn interval_is_narrowest_and_holds_mass() {
        let mut tau = vec![50; 80];
        tau.extend([48, 49, 49, 51, 51, 52, 60, 70, 10, 90]);
        tau.extend([50; 10]);
        let (lo, hi) = narrowest_interval(&tau, 0.94, 50).unwrap();
        let inside = tau.iter().filter(|&&t| lo <= t && t <= hi).count();
        assert!(inside as f64 >= 0.94 * tau.len() as f64);
        assert!(lo <= 50 && 50 <= hi);
        assert!(hi - lo <= 22, "({lo}, {hi})");
    }

    #[test]
    fn interval_widened_to_mode() {
        // Mass sits at 10..=12 but the mode argument lies outside.
        let tau = [10, 11, 12, 10, 11, 12, 40];
        let (lo, hi) = narrowest_interval(&tau, 0.5, 40).unwrap();
        assert_eq!(hi, 40);
        assert!(lo >= 10);
    }

    #[test]
    fn conditional_means_use_matching_draws() {
        let tau = [3, 4, 3];
        let a = [1.0, 100.0, 3.0];
        let b = [0.0, 0.0, 2.0];
        let m = conditional_means(&tau, [&a, &b, &a, &b], 3).unwrap();
        assert_eq!(m.count, 2);
        assert_eq!(m.mu_pre, 2.0);
        assert_eq!(m.mu_post, 1.0);
        assert!(conditional_means(&tau, [&a, &b, &a, &b], 9).is_none());
    }
}
