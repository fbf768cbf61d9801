//! Ordinary least squares with coefficient standard errors.
//!
//! Used by the ADF regression, where we need the t-statistic of a single
//! coefficient. Design matrices are tall and narrow (a handful of columns).
//!
//! - We solve via SVD so near-collinear lag columns do not blow up.
//! - Standard errors come from `σ̂² (XᵀX)⁻¹`; if `XᵀX` is singular we give up
//!   rather than report a made-up error.

use nalgebra::{DMatrix, DVector};

/// OLS coefficients plus the pieces needed for inference.
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub beta: DVector<f64>,
    pub std_errors: DVector<f64>,
    pub rss: f64,
    /// Residual degrees of freedom (`n - p`).
    pub dof: usize,
}

/// SVD solve with a few tolerance retries; `None` if nothing finite comes out.
fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Fit `y = Xβ + ε` and return coefficients with standard errors.
pub fn ols_with_errors(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<OlsFit> {
    let n = x.nrows();
    let p = x.ncols();
    if n <= p || y.len() != n {
        return None;
    }

    let beta = solve_least_squares(x, y)?;
    let residuals = y - x * &beta;
    let rss = residuals.norm_squared();
    let dof = n - p;
    let sigma2 = rss / dof as f64;

    let xtx_inv = (x.transpose() * x).try_inverse()?;
    let std_errors = DVector::from_iterator(p, (0..p).map(|j| (sigma2 * xtx_inv[(j, j)]).max(0.0).sqrt()));
    if !std_errors.iter().all(|v| v.is_finite()) {
        return None;
    }

    Some(OlsFit {
        beta,
        std_errors,
        rss,
        dof,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_errors_match_closed_form_slope() {
        // y = 1 + 2x + e with e = [+0.1, -0.1, -0.1, +0.1]
        let xs = [0.0, 1.0, 2.0, 3.0];
        let e = [0.1, -0.1, -0.1, 0.1];
        let mut rows = Vec::new();
        for &xi in &xs {
            rows.extend_from_slice(&[1.0, xi]);
        }
        let x = DMatrix::from_row_slice(4, 2, &rows);
        let y = DVector::from_iterator(4, xs.iter().zip(e.iter()).map(|(xi, ei)| 1.0 + 2.0 * xi + ei));

        let fit = ols_with_errors(&x, &y).unwrap();
        assert_eq!(fit.dof, 2);
        assert!((fit.beta[1] - 2.0).abs() < 1e-10);

        // se(slope) = sqrt(σ̂² / Σ(x - x̄)²), with Σ(x - x̄)² = 5.
        let sigma2 = fit.rss / 2.0;
        let expected = (sigma2 / 5.0).sqrt();
        assert!((fit.std_errors[1] - expected).abs() < 1e-10);
    }

    #[test]
    fn underdetermined_system_is_rejected() {
        let x = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 1.0, 1.0]);
        let y = DVector::from_row_slice(&[1.0, 2.0]);
        assert!(ols_with_errors(&x, &y).is_none());
    }
}
