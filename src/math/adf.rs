//! Augmented Dickey-Fuller unit-root test (constant, no trend).
//!
//! Regression: `Δy_t = α + γ y_{t-1} + Σ_{i=1..p} δ_i Δy_{t-i} + ε_t`.
//! The statistic is the t-ratio of `γ`; the null of a unit root is rejected
//! (series looks stationary) when it falls below the 5% critical value.
//!
//! Critical values are MacKinnon's asymptotic values for the constant-only
//! case; no p-value is interpolated.

use nalgebra::{DMatrix, DVector};
use serde::Serialize;

use crate::math::ols_with_errors;

pub const ADF_CRITICAL_1PCT: f64 = -3.43;
pub const ADF_CRITICAL_5PCT: f64 = -2.86;
pub const ADF_CRITICAL_10PCT: f64 = -2.57;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AdfResult {
    pub statistic: f64,
    pub lags: usize,
    /// Observations used in the regression.
    pub n_obs: usize,
    pub stationary: bool,
}

/// Default lag order: `floor(12 * (n / 100)^(1/4))` (Schwert), capped for short series.
pub fn default_adf_lags(n: usize) -> usize {
    let schwert = (12.0 * (n as f64 / 100.0).powf(0.25)).floor() as usize;
    schwert.min(n / 4)
}

/// Run the test; `None` when the series is too short or the regression is singular.
pub fn adf_test(series: &[f64], lags: Option<usize>) -> Option<AdfResult> {
    let n = series.len();
    if n < 10 || series.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let p = lags.unwrap_or_else(|| default_adf_lags(n));

    let diff: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();
    // diff[k] = y[k+1] - y[k]; the first usable target is diff[p].
    let rows = diff.len().checked_sub(p)?;
    let cols = 2 + p;
    if rows <= cols + 1 {
        return None;
    }

    let mut x = DMatrix::<f64>::zeros(rows, cols);
    let mut y = DVector::<f64>::zeros(rows);
    for (r, k) in (p..diff.len()).enumerate() {
        y[r] = diff[k];
        x[(r, 0)] = 1.0;
        x[(r, 1)] = series[k];
        for i in 1..=p {
            x[(r, 1 + i)] = diff[k - i];
        }
    }

    let fit = ols_with_errors(&x, &y)?;
    let se = fit.std_errors[1];
    if !(se.is_finite() && se > 0.0) {
        return None;
    }
    let statistic = fit.beta[1] / se;

    Some(AdfResult {
        statistic,
        lags: p,
        n_obs: rows,
        stationary: statistic < ADF_CRITICAL_5PCT,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;
    use rand::rngs::StdRng;
    use rand_distr::Normal;

    #[test]
    fn schwert_lags() {
        assert_eq!(default_adf_lags(100), 12);
        assert_eq!(default_adf_lags(20), 5);
    }

    #[test]
    fn mean_reverting_series_is_stationary() {
        let mut rng = StdRng::seed_from_u64(7);
        let normal = Normal::new(0.0, 1.0).unwrap();
        let mut y = vec![0.0];
        for _ in 1..500 {
            let prev = *y.last().unwrap();
            y.push(0.5 * prev + normal.sample(&mut rng));
        }
        let res = adf_test(&y, Some(2)).unwrap();
        assert!(res.stationary, "statistic {}", res.statistic);
        assert!(res.statistic < ADF_CRITICAL_1PCT);
    }

    #[test]
    fn explosive_series_is_not_stationary() {
        let mut rng = StdRng::seed_from_u64(11);
        let normal = Normal::new(0.0, 1.0).unwrap();
        let mut y = vec![10.0];
        for _ in 1..200 {
            let prev = *y.last().unwrap();
            y.push(1.02 * prev + normal.sample(&mut rng));
        }
        let res = adf_test(&y, Some(1)).unwrap();
        assert!(!res.stationary, "statistic {}", res.statistic);
    }

    #[test]
    fn short_series_returns_none() {
        assert!(adf_test(&[1.0, 2.0, 3.0], None).is_none());
    }
}
