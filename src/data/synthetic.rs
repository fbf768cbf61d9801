//! Synthetic Brent-like price series with known regimes.
//!
//! Useful for exercising the pipeline offline: returns are drawn from the
//! configured Gaussian regimes, compounded from a start price, and dated on
//! consecutive weekdays.

use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate, Weekday};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::PriceObservation;
use crate::error::AppError;

/// A stretch of `len` daily log returns ~ Normal(mu, sigma).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Regime {
    pub len: usize,
    pub mu: f64,
    pub sigma: f64,
}

impl FromStr for Regime {
    type Err = String;

    /// `len:mu:sigma`, e.g. `500:0:0.01`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        let [len, mu, sigma] = parts.as_slice() else {
            return Err(format!("expected len:mu:sigma, got '{s}'."));
        };
        let len: usize = len.parse().map_err(|_| format!("invalid regime length '{len}'."))?;
        let mu: f64 = mu.parse().map_err(|_| format!("invalid regime mean '{mu}'."))?;
        let sigma: f64 = sigma.parse().map_err(|_| format!("invalid regime sigma '{sigma}'."))?;
        if len == 0 || !mu.is_finite() || !(sigma.is_finite() && sigma > 0.0) {
            return Err(format!("regime '{s}' needs len > 0, finite mu, sigma > 0."));
        }
        Ok(Self { len, mu, sigma })
    }
}

/// Generate `1 + Σ len` prices starting at `start_price` on `start`.
pub fn simulate_prices(
    regimes: &[Regime],
    start: NaiveDate,
    start_price: f64,
    seed: u64,
) -> Result<Vec<PriceObservation>, AppError> {
    if regimes.is_empty() {
        return Err(AppError::Config("at least one regime is required.".into()));
    }
    if !(start_price.is_finite() && start_price > 0.0) {
        return Err(AppError::Config("start price must be finite and > 0.".into()));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut date = next_weekday(start);
    let mut price = start_price;
    let mut out = Vec::with_capacity(1 + regimes.iter().map(|r| r.len).sum::<usize>());
    out.push(PriceObservation { date, price });

    for regime in regimes {
        let dist = Normal::new(regime.mu, regime.sigma)
            .map_err(|e| AppError::Config(format!("invalid regime {regime:?}: {e}")))?;
        for _ in 0..regime.len {
            date = next_weekday(date + Days::new(1));
            price *= dist.sample(&mut rng).exp();
            out.push(PriceObservation { date, price });
        }
    }
    Ok(out)
}

fn next_weekday(mut date: NaiveDate) -> NaiveDate {
    while matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        date = date + Days::new(1);
    }
    date
}
