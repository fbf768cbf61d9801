//! Gaussian segment log-likelihoods over prefix sums.
//!
//! Every switch-point candidate τ splits the series into `[0, τ)` and
//! `[τ, n)`. With prefix sums of `y` and `y²` each segment's log-likelihood is
//! O(1), so the full conditional of τ costs O(n) per sweep. Everything stays
//! in log-space; nothing is exponentiated until it has been shifted by the max.

/// `ln(2π)`.
pub const LN_2PI: f64 = 1.837_877_066_409_345_5;

/// Floor for MLE variances of (near-)constant segments.
const VAR_FLOOR: f64 = 1e-18;

/// Sufficient statistics of one contiguous segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentStats {
    pub n: usize,
    pub sum: f64,
    pub sum_sq: f64,
}

impl SegmentStats {
    pub fn mean(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        self.sum / self.n as f64
    }

    /// Population variance of the segment, floored.
    pub fn variance(&self) -> f64 {
        if self.n == 0 {
            return VAR_FLOOR;
        }
        let m = self.mean();
        (self.sum_sq / self.n as f64 - m * m).max(VAR_FLOOR)
    }

    /// `Σ ln N(y_i | mu, sigma)` over the segment.
    pub fn log_likelihood(&self, mu: f64, sigma: f64) -> f64 {
        let n = self.n as f64;
        let quad = (self.sum_sq - 2.0 * mu * self.sum + n * mu * mu).max(0.0);
        -0.5 * n * LN_2PI - n * sigma.ln() - quad / (2.0 * sigma * sigma)
    }

    /// Log-likelihood at the segment's own MLE `(ȳ, σ̂)`.
    pub fn mle_log_likelihood(&self) -> f64 {
        let n = self.n as f64;
        -0.5 * n * (LN_2PI + self.variance().ln() + 1.0)
    }
}

/// Cumulative `Σy` and `Σy²` for O(1) segment statistics.
#[derive(Debug, Clone)]
pub struct PrefixSums {
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
}

impl PrefixSums {
    pub fn new(y: &[f64]) -> Self {
        let mut sum = Vec::with_capacity(y.len() + 1);
        let mut sum_sq = Vec::with_capacity(y.len() + 1);
        sum.push(0.0);
        sum_sq.push(0.0);
        let (mut s, mut s2) = (0.0, 0.0);
        for &v in y {
            s += v;
            s2 += v * v;
            sum.push(s);
            sum_sq.push(s2);
        }
        Self { sum, sum_sq }
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.sum.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Statistics of `[a, b)`.
    pub fn segment(&self, a: usize, b: usize) -> SegmentStats {
        debug_assert!(a <= b && b <= self.len());
        SegmentStats {
            n: b - a,
            sum: self.sum[b] - self.sum[a],
            sum_sq: self.sum_sq[b] - self.sum_sq[a],
        }
    }

    /// Unnormalised log full conditional of τ for every τ in `lo..=hi`.
    ///
    /// `out[k]` corresponds to `τ = lo + k`. The uniform prior is a constant and
    /// is dropped.
    pub fn tau_log_weights(&self, lo: usize, hi: usize, pre: (f64, f64), post: (f64, f64), out: &mut Vec<f64>) {
        let n = self.len();
        out.clear();
        out.extend((lo..=hi).map(|tau| {
            self.segment(0, tau).log_likelihood(pre.0, pre.1) + self.segment(tau, n).log_likelihood(post.0, post.1)
        }));
    }

    /// Log-likelihood improvement of splitting at `tau` (two-regime MLE vs one-regime MLE).
    pub fn split_gain(&self, tau: usize) -> f64 {
        let n = self.len();
        self.segment(0, tau).mle_log_likelihood() + self.segment(tau, n).mle_log_likelihood()
            - self.segment(0, n).mle_log_likelihood()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normal_logpdf(y: f64, mu: f64, sigma: f64) -> f64 {
        -0.5 * LN_2PI - sigma.ln() - (y - mu).powi(2) / (2.0 * sigma * sigma)
    }

    #[test]
    fn segment_log_likelihood_matches_direct_sum() {
        let y = [0.01, -0.02, 0.005, 0.03, -0.01, 0.0];
        let prefix = PrefixSums::new(&y);
        let seg = prefix.segment(1, 5);
        assert_eq!(seg.n, 4);

        let direct: f64 = y[1..5].iter().map(|&v| normal_logpdf(v, 0.002, 0.015)).sum();
        assert!((seg.log_likelihood(0.002, 0.015) - direct).abs() < 1e-9);
    }

    #[test]
    fn tau_weights_peak_at_true_split() {
        let mut y = vec![0.0; 40];
        y.extend(vec![1.0; 40]);
        // Small deterministic wiggle so variances are non-zero.
        for (i, v) in y.iter_mut().enumerate() {
            *v += if i % 2 == 0 { 0.05 } else { -0.05 };
        }
        let prefix = PrefixSums::new(&y);
        let mut w = Vec::new();
        prefix.tau_log_weights(5, 75, (0.0, 0.05), (1.0, 0.05), &mut w);
        assert_eq!(w.len(), 71);

        let best = w
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(k, _)| 5 + k)
            .unwrap();
        assert_eq!(best, 40);
        assert!(w.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn split_gain_is_larger_at_real_break() {
        let mut y: Vec<f64> = (0..50).map(|i| if i % 2 == 0 { 0.01 } else { -0.01 }).collect();
        y.extend((0..50).map(|i| 0.5 + if i % 2 == 0 { 0.01 } else { -0.01 }));
        let prefix = PrefixSums::new(&y);
        assert!(prefix.split_gain(50) > prefix.split_gain(25));
        assert!(prefix.split_gain(50) > 0.0);
    }
}
