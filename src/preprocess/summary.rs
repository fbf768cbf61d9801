//! Descriptive summary and stationarity diagnostics for a cleaned series.

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{PriceObservation, ReturnObservation};
use crate::math::{AdfResult, adf_test, mean, sample_std};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub n_prices: usize,
    pub n_returns: usize,
    pub mean_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub mean_return: Option<f64>,
    pub return_volatility: Option<f64>,
}

/// ADF results for the price level and for the log-returns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Stationarity {
    pub prices: Option<AdfResult>,
    pub returns: Option<AdfResult>,
}

pub fn summarize(prices: &[PriceObservation], returns: &[ReturnObservation]) -> Option<SeriesSummary> {
    let first = prices.first()?;
    let last = prices.last()?;
    let levels: Vec<f64> = prices.iter().map(|p| p.price).collect();
    let rets: Vec<f64> = returns.iter().map(|r| r.log_return).collect();

    Some(SeriesSummary {
        start: first.date,
        end: last.date,
        n_prices: prices.len(),
        n_returns: returns.len(),
        mean_price: mean(&levels)?,
        min_price: levels.iter().copied().fold(f64::INFINITY, f64::min),
        max_price: levels.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        mean_return: mean(&rets),
        return_volatility: sample_std(&rets),
    })
}

pub fn stationarity(prices: &[PriceObservation], returns: &[ReturnObservation]) -> Stationarity {
    let levels: Vec<f64> = prices.iter().map(|p| p.price).collect();
    let rets: Vec<f64> = returns.iter().map(|r| r.log_return).collect();
    Stationarity {
        prices: adf_test(&levels, None),
        returns: adf_test(&rets, None),
    }
}
