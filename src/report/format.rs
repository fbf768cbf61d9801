//! Formatted terminal output for each stage.
//!
//! We keep formatting code in one place so:
//! - the fitting and association code stays free of presentation
//! - output changes are localized

use crate::domain::{ChangePointEstimate, ConvergenceWarning};
use crate::fit::ChangePointFit;
use crate::impact::Association;
use crate::math::{ADF_CRITICAL_5PCT, AdfResult};
use crate::preprocess::{Preprocessed, SeriesSummary, Stationarity};

/// How many dropped rows are listed individually before summarising.
const MAX_LISTED_DROPS: usize = 10;

pub fn format_preprocess_summary(pre: &Preprocessed, summary: &SeriesSummary, stationarity: &Stationarity) -> String {
    let mut out = String::new();

    out.push_str("=== regimes - Preprocessing ===\n");
    out.push_str(&format!(
        "Rows: read={} | kept={} | dropped={} | duplicate dates={}\n",
        pre.rows_read,
        pre.prices.len(),
        pre.dropped.len(),
        pre.duplicates
    ));
    out.push_str(&format!(
        "Range: {} .. {} | prices={} | returns={}\n",
        summary.start, summary.end, summary.n_prices, summary.n_returns
    ));
    out.push_str(&format!(
        "Price: mean={:.2} min={:.2} max={:.2}\n",
        summary.mean_price, summary.min_price, summary.max_price
    ));
    out.push_str(&format!(
        "Log-return: mean={} vol={}\n",
        fmt_opt(summary.mean_return, 6),
        fmt_opt(summary.return_volatility, 6)
    ));

    out.push_str("\nStationarity (ADF, constant):\n");
    out.push_str(&format!("- price     : {}\n", fmt_adf(stationarity.prices.as_ref())));
    out.push_str(&format!("- log-return: {}\n", fmt_adf(stationarity.returns.as_ref())));

    if !pre.dropped.is_empty() {
        out.push_str("\nDropped rows:\n");
        for row in pre.dropped.iter().take(MAX_LISTED_DROPS) {
            out.push_str(&format!("- line {}: {}\n", row.line, row.reason));
        }
        if pre.dropped.len() > MAX_LISTED_DROPS {
            out.push_str(&format!("- ... and {} more\n", pre.dropped.len() - MAX_LISTED_DROPS));
        }
    }

    out
}

/// Change-point table plus per-parameter diagnostics when fits are available.
pub fn format_change_points(
    estimates: &[ChangePointEstimate],
    fits: Option<&[ChangePointFit]>,
    warnings: &[ConvergenceWarning],
) -> String {
    let mut out = String::new();
    out.push_str("=== regimes - Change points ===\n");
    if estimates.is_empty() {
        out.push_str("(none)\n");
        return out;
    }

    out.push_str(
        format!(
            "{:>6} {:<10} {:<23} {:>6} {:>10} {:>10} {:>9} {:>9} {:>7} {:>7}\n",
            "index", "date", "credible interval", "p", "mu_pre", "mu_post", "sd_pre", "sd_post", "r_hat", "ess"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<6} {:-<10} {:-<23} {:-<6} {:-<10} {:-<10} {:-<9} {:-<9} {:-<7} {:-<7}\n",
            "", "", "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for e in estimates {
        let flag = if e.convergence.converged { "" } else { " !" };
        out.push_str(&format!(
            "{:>6} {:<10} {:<23} {:>6.3} {:>10.6} {:>10.6} {:>9.6} {:>9.6} {:>7} {:>7.0}{flag}\n",
            e.index,
            e.date,
            format!("{} .. {}", e.ci_low_date, e.ci_high_date),
            e.probability,
            e.posterior_mean_pre,
            e.posterior_mean_post,
            e.posterior_std_pre,
            e.posterior_std_post,
            fmt_opt(e.convergence.max_r_hat, 3),
            e.convergence.min_ess,
        ));
    }

    if let Some(fits) = fits {
        for fit in fits {
            out.push_str(&format!(
                "\nDiagnostics @ {} (chains used={}, diverged={}, sigma acceptance={:.2}, log gain={:.2}):\n",
                fit.estimate.date,
                fit.diagnostics.chains_used,
                fit.diagnostics.chains_diverged,
                fit.acceptance,
                fit.log_gain
            ));
            for p in &fit.diagnostics.parameters {
                out.push_str(&format!(
                    "  {:<8} r_hat={:>7} ess={:>8.0}\n",
                    p.name,
                    fmt_opt(p.r_hat, 3),
                    p.ess
                ));
            }
        }
    }

    if !warnings.is_empty() {
        out.push_str("\nConvergence warnings:\n");
        for w in warnings {
            out.push_str(&format!("- {w}\n"));
        }
    }
    out
}

pub fn format_impacts(association: &Association) -> String {
    let mut out = String::new();
    out.push_str("=== regimes - Event impacts ===\n");
    out.push_str(&format!(
        "matched={} | skipped={} | no change point in window={}\n",
        association.impacts.len(),
        association.skipped.len(),
        association.unmatched
    ));

    if !association.impacts.is_empty() {
        out.push('\n');
        out.push_str(
            format!(
                "{:<32} {:<10} {:<10} {:>5} {:>9} {:>9} {:>8} {:>8}\n",
                "event", "date", "change pt", "days", "pre px", "post px", "px %", "vol %"
            )
            .trim_end(),
        );
        out.push('\n');
        out.push_str(
            format!(
                "{:-<32} {:-<10} {:-<10} {:-<5} {:-<9} {:-<9} {:-<8} {:-<8}\n",
                "", "", "", "", "", "", "", ""
            )
            .trim_end(),
        );
        out.push('\n');
        for i in &association.impacts {
            out.push_str(&format!(
                "{:<32} {:<10} {:<10} {:>5} {:>9.2} {:>9.2} {:>8.2} {:>8.2}\n",
                truncate(&i.event.name, 32),
                i.event.event_date,
                i.change_point_date,
                i.days_difference,
                i.pre_event_price,
                i.post_event_price,
                i.price_change_pct,
                i.volatility_change_pct
            ));
        }
    }

    if !association.skipped.is_empty() {
        out.push_str("\nSkipped:\n");
        for s in &association.skipped {
            out.push_str(&format!("- {s}\n"));
        }
    }
    out
}

fn fmt_adf(r: Option<&AdfResult>) -> String {
    match r {
        None => "n/a (series too short)".to_string(),
        Some(r) => format!(
            "stat={:.3} (5% crit {:.2}) lags={} n={} -> {}",
            r.statistic,
            ADF_CRITICAL_5PCT,
            r.lags,
            r.n_obs,
            if r.stationary { "stationary" } else { "unit root not rejected" }
        ),
    }
}

fn fmt_opt(v: Option<f64>, decimals: usize) -> String {
    match v {
        Some(x) => format!("{x:.decimals$}"),
        None => "-".to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
